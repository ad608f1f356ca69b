//! Evidence container abstraction
//!
//! One random-access contract over raw sector dumps and segmented EWF images.
//! The container kind is declared by the caller and resolved once at
//! [`EvidenceContainer::open`] into a boxed [`ImageSource`]; every later read
//! goes through that interface value.
//!
//! ```rust,ignore
//! let mut image = EvidenceContainer::open("disk.E01", ContainerKind::Segmented)?;
//! let boot = image.read(0, 512)?;
//! image.close();
//! ```

mod ewf;
mod raw;

pub use ewf::{EwfImage, StoredImageHash, VolumeSection};
pub use raw::RawImage;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{ContainerOpenError, ReadError};

// =============================================================================
// Container Kind
// =============================================================================

/// Declared on-disk encoding of an evidence container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ContainerKind {
    Raw,
    Segmented,
}

impl FromStr for ContainerKind {
    type Err = ContainerOpenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "dd" => Ok(ContainerKind::Raw),
            "ewf" | "e01" | "segmented" => Ok(ContainerKind::Segmented),
            other => Err(ContainerOpenError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Raw => f.write_str("raw"),
            ContainerKind::Segmented => f.write_str("ewf"),
        }
    }
}

// =============================================================================
// Read Contracts
// =============================================================================

/// Positioned reads over a byte-addressable source
///
/// `read_at` fills as much of `buf` as is available from `offset` and returns
/// the number of bytes copied. Parsers for partition tables and file systems
/// are written against this trait only.
pub trait ReadAt {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError>;

    fn size(&self) -> u64;

    /// Fill `buf` completely or fail with [`ReadError::ShortRead`]
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), ReadError> {
        let got = self.read_at(offset, buf)?;
        if got != buf.len() {
            return Err(ReadError::ShortRead {
                offset,
                wanted: buf.len(),
                got,
            });
        }
        Ok(())
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let available = &self[start..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Media geometry reported by metadata-bearing containers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediaInfo {
    pub bytes_per_sector: u32,
    pub sector_count: u64,
    pub total_size: u64,
}

/// Backend behind an [`EvidenceContainer`]
///
/// Callers guarantee `offset < size()` and that the span is clipped to the
/// end of the image; implementations only translate the request.
pub trait ImageSource: ReadAt + Send {
    /// Acquisition header fields in the container's native order
    fn header_values(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Stored acquisition hashes as `(algorithm, hex digest)`
    fn hash_values(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn media_info(&self) -> Option<MediaInfo> {
        None
    }

    /// Release file handles
    fn close(&mut self) {}
}

// =============================================================================
// Evidence Container
// =============================================================================

/// An opened evidence container
///
/// Exclusively owned by one pipeline run. `close` releases the underlying
/// handles once; dropping the container closes it as well.
pub struct EvidenceContainer {
    path: PathBuf,
    kind: ContainerKind,
    size: u64,
    source: Option<Box<dyn ImageSource>>,
}

impl EvidenceContainer {
    /// Open a container of the declared kind
    #[instrument(skip_all, fields(path = %path.as_ref().display(), %kind))]
    pub fn open(path: impl AsRef<Path>, kind: ContainerKind) -> Result<Self, ContainerOpenError> {
        let path = path.as_ref();
        let source: Box<dyn ImageSource> = match kind {
            ContainerKind::Raw => Box::new(RawImage::open(path)?),
            ContainerKind::Segmented => Box::new(EwfImage::open(path)?),
        };
        let size = source.size();
        info!(size, "Opened evidence container");

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            size,
            source: Some(source),
        })
    }

    /// Wrap an already-resolved source
    pub fn from_source(path: impl Into<PathBuf>, kind: ContainerKind, source: Box<dyn ImageSource>) -> Self {
        let size = source.size();
        Self {
            path: path.into(),
            kind,
            size,
            source: Some(source),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Read up to `length` bytes at `offset`, clipped at the end of the image
    pub fn read(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, ReadError> {
        if self.is_closed() {
            return Err(ReadError::Closed);
        }
        if length == 0 {
            return Ok(Vec::new());
        }
        if offset >= self.size {
            return Err(ReadError::OutOfRange { offset, size: self.size });
        }
        let available = self.size - offset;
        let mut buf = vec![0u8; length.min(usize::try_from(available).unwrap_or(usize::MAX))];
        let got = ReadAt::read_at(self, offset, &mut buf)?;
        buf.truncate(got);
        Ok(buf)
    }

    /// Header fields of a segmented container; empty for raw images
    pub fn header_values(&self) -> Vec<(String, String)> {
        self.source
            .as_ref()
            .map(|s| s.header_values())
            .unwrap_or_default()
    }

    /// Stored acquisition hashes of a segmented container; empty for raw images
    pub fn hash_values(&self) -> Vec<(String, String)> {
        self.source
            .as_ref()
            .map(|s| s.hash_values())
            .unwrap_or_default()
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.source.as_ref().and_then(|s| s.media_info())
    }

    /// Release the underlying handles; closing twice is a no-op
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            debug!(path = %self.path.display(), "Closed evidence container");
        }
    }
}

impl ReadAt for EvidenceContainer {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        let size = self.size;
        let source = self.source.as_mut().ok_or(ReadError::Closed)?;
        if buf.is_empty() {
            return Ok(0);
        }
        if offset >= size {
            return Err(ReadError::OutOfRange { offset, size });
        }
        let span = buf.len().min(usize::try_from(size - offset).unwrap_or(usize::MAX));
        source.read_at(offset, &mut buf[..span])
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for EvidenceContainer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EvidenceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceContainer")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::EwfFixture;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("RAW".parse::<ContainerKind>().unwrap(), ContainerKind::Raw);
        assert_eq!("ewf".parse::<ContainerKind>().unwrap(), ContainerKind::Segmented);
        assert!(matches!(
            "vmdk".parse::<ContainerKind>(),
            Err(ContainerOpenError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_raw_full_read_matches_file() {
        let data = patterned(5000);
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&data).unwrap();

        let mut image = EvidenceContainer::open(temp.path(), ContainerKind::Raw).unwrap();
        assert_eq!(image.size(), 5000);
        let all = image.read(0, image.size() as usize).unwrap();
        assert_eq!(all, std::fs::read(temp.path()).unwrap());
        assert!(image.header_values().is_empty());
        assert!(image.media_info().is_none());
    }

    #[test]
    fn test_raw_read_clipped_and_out_of_range() {
        let data = patterned(1000);
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&data).unwrap();

        let mut image = EvidenceContainer::open(temp.path(), ContainerKind::Raw).unwrap();
        assert_eq!(image.read(990, 100).unwrap(), &data[990..]);
        assert!(matches!(
            image.read(1000, 1),
            Err(ReadError::OutOfRange { offset: 1000, size: 1000 })
        ));
        assert!(image.read(1000, 0).unwrap().is_empty());
    }

    #[test]
    fn test_open_missing_raw() {
        let dir = TempDir::new().unwrap();
        let err = EvidenceContainer::open(dir.path().join("nope.dd"), ContainerKind::Raw).unwrap_err();
        assert!(matches!(err, ContainerOpenError::NotFound { .. }));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&[1u8; 64]).unwrap();

        let mut image = EvidenceContainer::open(temp.path(), ContainerKind::Raw).unwrap();
        image.close();
        image.close();
        assert!(image.is_closed());
        assert!(matches!(image.read(0, 4), Err(ReadError::Closed)));
    }

    #[test]
    fn test_segmented_read_spanning_segments() {
        let dir = TempDir::new().unwrap();
        let data = patterned(64 * 512);
        let first = EwfFixture::new(data.clone())
            .chunks_per_segment(3)
            .write(dir.path(), "disk");

        let mut image = EvidenceContainer::open(&first, ContainerKind::Segmented).unwrap();
        assert_eq!(image.size(), data.len() as u64);

        // Chunks are 2048 bytes and three per segment, so segment 1 holds 0..6144
        let boundary = 3 * 2048u64;
        let left = image.read(boundary - 300, 300).unwrap();
        let right = image.read(boundary, 500).unwrap();
        let spanning = image.read(boundary - 300, 800).unwrap();
        assert_eq!(spanning, [left, right].concat());
        assert_eq!(spanning, &data[(boundary as usize - 300)..(boundary as usize + 500)]);

        assert_eq!(image.read(0, data.len()).unwrap(), data);
    }

    #[test]
    fn test_segmented_metadata() {
        let dir = TempDir::new().unwrap();
        let data = patterned(16 * 512);
        let first = EwfFixture::new(data.clone())
            .header("c", "CASE-7")
            .header("e", "J. Doe")
            .with_md5()
            .write(dir.path(), "evidence");

        let image = EvidenceContainer::open(&first, ContainerKind::Segmented).unwrap();
        let header = image.header_values();
        assert_eq!(header[0], ("case_number".to_string(), "CASE-7".to_string()));
        assert_eq!(header[1], ("examiner_name".to_string(), "J. Doe".to_string()));

        let hashes = image.hash_values();
        assert_eq!(hashes[0].0, "MD5");
        assert_eq!(hashes[0].1, crate::common::compute_hash(&data, crate::common::HashAlgorithm::Md5));

        let media = image.media_info().unwrap();
        assert_eq!(media.bytes_per_sector, 512);
        assert_eq!(media.sector_count, 16);
        assert_eq!(media.total_size, data.len() as u64);
    }

    #[test]
    fn test_segmented_no_segments() {
        let dir = TempDir::new().unwrap();
        let err = EvidenceContainer::open(dir.path().join("absent.E01"), ContainerKind::Segmented)
            .unwrap_err();
        assert!(matches!(err, ContainerOpenError::NoSegments { .. }));
    }
}
