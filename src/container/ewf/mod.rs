//! EWF (Expert Witness Format) v1 - segmented E01 evidence images
//!
//! ## EWF Format Overview
//!
//! - **Segmented storage**: one image split across .E01, .E02, ... files
//! - **Zlib compression**: chunks are individually compressed
//! - **Chunk-based access**: random access to any part of the image
//! - **Embedded metadata**: acquisition header fields and MD5/SHA1 hashes
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ File header (13 bytes)                                       │
//! │  "EVF\x09\x0d\x0a\xff\x00" | 0x01 | segment no. (u16) | 0x00 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Section chain (76-byte descriptors, segment-local offsets)   │
//! │  header / header2: case, examiner, dates                     │
//! │  volume / disk:    chunk count, sector geometry              │
//! │  sectors:          chunk data                                │
//! │  table / table2:   chunk offsets (bit 31 = compressed)       │
//! │  hash / digest:    stored MD5 / SHA1                         │
//! │  next / done:      end of this segment / of the image        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! EWF v2 (Ex01, "EVF2") is recognised and rejected.

mod cache;
mod handle;
mod header;
mod types;

pub use handle::EwfImage;
pub use types::{StoredImageHash, VolumeSection};
