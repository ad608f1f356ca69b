//! Filesystem views - structured interpretation of a container at an offset
//!
//! A view yields the raw records of the root directory in on-disk order.
//! Records keep whatever the on-disk structure had: a tombstoned entry can
//! come back without metadata, a slack slot without a name. Deciding which
//! records become directory listing rows is the extractor's job.

mod fat;

pub use fat::FatFileSystem;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::container::ReadAt;
use crate::error::{LayoutOpenError, ReadError};

/// Record type as stored in the metadata record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MetaType {
    Regular,
    Directory,
    Other,
}

/// The metadata ("inode") side of a directory record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaRecord {
    pub meta_type: MetaType,
    pub size: u64,
    /// Unix epoch seconds
    pub created: i64,
    pub modified: i64,
}

/// One root-directory record; either side may be missing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawDirRecord {
    pub name: Option<Vec<u8>>,
    pub meta: Option<MetaRecord>,
}

pub trait FileSystem {
    /// Short type label, e.g. "FAT16"
    fn type_name(&self) -> &'static str;

    /// Byte offset of the file system inside the container
    fn offset(&self) -> u64;

    /// The "directory" type constant of this file system
    fn directory_type(&self) -> MetaType {
        MetaType::Directory
    }

    /// Records of the root directory, single level, in on-disk order
    fn root_records(&mut self, source: &mut dyn ReadAt) -> Result<Vec<RawDirRecord>, ReadError>;
}

/// Open a file system view at byte `offset`
#[instrument(skip(source))]
pub fn open_filesystem(source: &mut dyn ReadAt, offset: u64) -> Result<Box<dyn FileSystem>, LayoutOpenError> {
    match FatFileSystem::open(source, offset) {
        Ok(fat) => {
            debug!(fs = fat.type_name(), "File system opened");
            Ok(Box::new(fat))
        }
        Err(reason) => Err(LayoutOpenError::FileSystem { offset, reason }),
    }
}
