// RAW disk image backend (.dd, .raw, .img, .dmg)
// Offsets map directly onto the single on-disk file.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::{ImageSource, ReadAt};
use crate::error::{ContainerOpenError, ReadError};

// =============================================================================
// Raw Image Handle
// =============================================================================

pub struct RawImage {
    path: PathBuf,
    file: Option<File>,
    size: u64,
}

impl RawImage {
    /// Open a raw image file
    pub fn open(path: &Path) -> Result<Self, ContainerOpenError> {
        if !path.is_file() {
            return Err(ContainerOpenError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path).map_err(|source| ContainerOpenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| ContainerOpenError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        debug!(?path, size, "Opened raw image");
        Ok(RawImage {
            path: path.to_path_buf(),
            file: Some(file),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadAt for RawImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        let file = self.file.as_mut().ok_or(ReadError::Closed)?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| ReadError::Io { offset, source })?;

        let mut total_read = 0;
        while total_read < buf.len() {
            match file.read(&mut buf[total_read..]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(ReadError::Io {
                        offset: offset + total_read as u64,
                        source,
                    })
                }
            }
        }

        trace!(offset, requested = buf.len(), total_read, "Raw read");
        Ok(total_read)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl ImageSource for RawImage {
    fn close(&mut self) {
        self.file = None;
    }
}
