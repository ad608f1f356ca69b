// Common utilities shared across container and layout parsers

pub mod binary;
pub mod hash;
pub mod io_pool;
pub mod segments;

// Re-exports for convenience
pub use hash::{compute_hash, hashes_match, HashAlgorithm, StreamingHasher};
pub use io_pool::SegmentHandles;
pub use segments::discover_e01_segments;

// Shared constants
pub const BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8MB buffer for streaming reads
pub const SECTOR_SIZE: u64 = 512;
