//! Type definitions for EWF format parsing

use serde::Serialize;

// =============================================================================
// Core Constants
// =============================================================================

pub(crate) const EWF_SIGNATURE: &[u8; 8] = b"EVF\x09\x0d\x0a\xff\x00";
pub(crate) const EWF2_SIGNATURE: &[u8; 8] = b"EVF2\x0d\x0a\x81\x00";
pub(crate) const FILE_HEADER_SIZE: u64 = 13;
pub(crate) const SECTION_DESCRIPTOR_SIZE: u64 = 76;
pub(crate) const MAX_OPEN_FILES: usize = 16; // Like libewf's rlimit handling
pub(crate) const CHUNK_CACHE_ENTRIES: usize = 256;
pub(crate) const MAX_SECTIONS_PER_SEGMENT: usize = 10_000;
pub(crate) const MAX_HEADER_SIZE: u64 = 1024 * 1024;
pub(crate) const COMPRESSED_FLAG: u32 = 0x8000_0000;
pub(crate) const TABLE_HEADER_SIZE: u64 = 24;
pub(crate) const MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

// =============================================================================
// Stored Hash Types - Hashes embedded in EWF sections
// =============================================================================

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredImageHash {
    pub algorithm: String,
    pub hash: String,
}

// =============================================================================
// Section Descriptors - EWF Format Structures
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) struct SectionDescriptor {
    pub section_type: String,
    /// Offset of the next descriptor, relative to the start of the segment file
    pub next_offset: u64,
    /// Section size including this descriptor
    pub size: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct VolumeSection {
    pub chunk_count: u32,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub sector_count: u64,
}

impl VolumeSection {
    pub fn chunk_size(&self) -> usize {
        (self.sectors_per_chunk as usize).saturating_mul(self.bytes_per_sector as usize)
    }

    pub fn media_size(&self) -> u64 {
        self.sector_count.saturating_mul(self.bytes_per_sector as u64)
    }
}

// =============================================================================
// Segment File - Represents one physical E01/E02 file
// =============================================================================

/// Metadata for a single segment file (like libewf_segment_file)
#[derive(Debug)]
pub(crate) struct SegmentFile {
    /// Index in the file pool
    pub file_index: usize,
    /// Segment number from the file header (1 for E01, 2 for E02, etc.)
    pub segment_number: u16,
    /// Size of this segment file in bytes
    pub file_size: u64,
}

#[derive(Clone, Debug)]
pub(crate) struct TableSection {
    pub base_offset: u64,
    /// Raw entries; bit 31 flags a compressed chunk
    pub offsets: Vec<u32>,
}

// =============================================================================
// Chunk Location - Maps chunks to their storage location
// =============================================================================

#[derive(Clone, Copy, Debug)]
pub(crate) struct ChunkLocation {
    pub segment_index: usize,
    /// Offset of the chunk data within its segment file
    pub offset: u64,
    pub compressed: bool,
}
