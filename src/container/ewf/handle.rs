//! EwfImage - random access over an E01 segment set (like libewf_handle)

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use tracing::{debug, trace, warn};

use super::cache::ChunkCache;
use super::header::decode_header_section;
use super::types::*;
use crate::common::{
    binary::{read_bytes_at, read_u32_le, read_u64_le},
    segments::discover_e01_segments,
    SegmentHandles,
};
use crate::container::{ImageSource, MediaInfo, ReadAt};
use crate::error::{ContainerOpenError, ReadError};

// =============================================================================
// EWF Image - Main Interface (like libewf_handle)
// =============================================================================

pub struct EwfImage {
    /// File I/O pool managing all segment files
    segment_files: SegmentHandles,
    /// Parsed segment file metadata
    segments: Vec<SegmentFile>,
    /// Volume information from the first volume/disk section
    volume: VolumeSection,
    /// Global chunk table: chunk_index -> storage location
    chunk_table: Vec<ChunkLocation>,
    chunk_cache: ChunkCache,
    header: Vec<(String, String)>,
    stored_hashes: Vec<StoredImageHash>,
}

/// Everything collected while walking the section chains
#[derive(Default)]
struct SectionWalk {
    header: Option<Vec<(String, String)>>,
    header2: Option<Vec<(String, String)>>,
    volume: Option<VolumeSection>,
    chunk_table: Vec<ChunkLocation>,
    stored_hashes: Vec<StoredImageHash>,
}

impl EwfImage {
    /// Open E01 file set (like libewf_handle_open)
    pub fn open(path: &Path) -> Result<Self, ContainerOpenError> {
        // Step 1: Discover all segment files (like libewf_glob)
        let segment_paths = discover_e01_segments(path).map_err(|reason| {
            debug!(?path, %reason, "Segment discovery failed");
            ContainerOpenError::NoSegments {
                base: path.to_path_buf(),
            }
        })?;

        // Step 2: Create file I/O pool
        let mut segment_files = SegmentHandles::new(segment_paths, MAX_OPEN_FILES);

        // Step 3: Validate every segment's file header
        let mut segments = Vec::with_capacity(segment_files.len());
        for index in 0..segment_files.len() {
            segments.push(Self::read_segment_header(&mut segment_files, index)?);
        }

        // Step 4: Walk each segment's section chain
        let mut walk = SectionWalk::default();
        for segment_index in 0..segments.len() {
            Self::walk_segment(&mut segment_files, &segments, segment_index, &mut walk).map_err(|reason| {
                ContainerOpenError::InvalidFormat {
                    path: segment_files.paths()[segment_index].clone(),
                    reason,
                }
            })?;
        }

        let invalid = |reason: String| ContainerOpenError::InvalidFormat {
            path: path.to_path_buf(),
            reason,
        };

        let volume = walk.volume.ok_or_else(|| invalid("no volume section found".into()))?;
        if volume.chunk_count == 0 || volume.sectors_per_chunk == 0 || volume.bytes_per_sector == 0 {
            return Err(invalid("image has no chunks".into()));
        }
        let chunk_size = (volume.sectors_per_chunk as u64) * volume.bytes_per_sector as u64;
        if chunk_size > MAX_CHUNK_SIZE {
            return Err(invalid(format!("chunk size {} exceeds {} bytes", chunk_size, MAX_CHUNK_SIZE)));
        }
        if volume.sector_count.checked_mul(volume.bytes_per_sector as u64).is_none() {
            return Err(invalid(format!(
                "{} sectors of {} bytes overflow the media size",
                volume.sector_count, volume.bytes_per_sector
            )));
        }
        let addressable = volume.chunk_count as u64 * volume.sectors_per_chunk as u64;
        if volume.sector_count > addressable {
            return Err(invalid(format!(
                "{} sectors do not fit in {} chunks of {} sectors",
                volume.sector_count, volume.chunk_count, volume.sectors_per_chunk
            )));
        }
        if walk.chunk_table.len() < volume.chunk_count as usize {
            return Err(invalid(format!(
                "chunk tables list {} of {} chunks",
                walk.chunk_table.len(),
                volume.chunk_count
            )));
        }
        walk.chunk_table.truncate(volume.chunk_count as usize);

        debug!(
            segments = segments.len(),
            chunks = volume.chunk_count,
            media_size = volume.media_size(),
            "EWF image opened"
        );

        Ok(Self {
            segment_files,
            segments,
            volume,
            chunk_table: walk.chunk_table,
            chunk_cache: ChunkCache::new(CHUNK_CACHE_ENTRIES),
            header: walk.header2.or(walk.header).unwrap_or_default(),
            stored_hashes: walk.stored_hashes,
        })
    }

    /// Read and validate the 13-byte file header of segment `index`
    fn read_segment_header(segment_files: &mut SegmentHandles, index: usize) -> Result<SegmentFile, ContainerOpenError> {
        let path = segment_files.paths()[index].clone();
        let io_error = |source: std::io::Error| ContainerOpenError::Io {
            path: path.clone(),
            source,
        };

        let file = segment_files.handle(index).map_err(io_error)?;
        let file_size = file.metadata().map_err(io_error)?.len();

        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        let read = file
            .seek(SeekFrom::Start(0))
            .and_then(|_| file.read_exact(&mut header));
        if read.is_err() {
            return Err(ContainerOpenError::InvalidFormat {
                path,
                reason: "segment is shorter than the EWF file header".into(),
            });
        }

        if &header[0..8] == EWF2_SIGNATURE {
            return Err(ContainerOpenError::Unsupported {
                path,
                reason: "EWF version 2 (Ex01) images are not supported".into(),
            });
        }
        if &header[0..8] != EWF_SIGNATURE {
            return Err(ContainerOpenError::InvalidFormat {
                path,
                reason: "missing EVF signature".into(),
            });
        }

        let segment_number = u16::from_le_bytes([header[9], header[10]]);
        if segment_number as usize != index + 1 {
            return Err(ContainerOpenError::InvalidFormat {
                path,
                reason: format!(
                    "segment number {} found where segment {} was expected",
                    segment_number,
                    index + 1
                ),
            });
        }

        trace!(index, segment_number, file_size, "Validated segment header");
        Ok(SegmentFile {
            file_index: index,
            segment_number,
            file_size,
        })
    }

    /// Follow one segment's section chain (next offsets are segment-local)
    fn walk_segment(
        segment_files: &mut SegmentHandles,
        segments: &[SegmentFile],
        segment_index: usize,
        walk: &mut SectionWalk,
    ) -> Result<(), String> {
        let segment = &segments[segment_index];
        let file = segment_files
            .handle(segment.file_index)
            .map_err(|e| format!("Failed to open segment: {}", e))?;

        let mut offset = FILE_HEADER_SIZE;
        for _ in 0..MAX_SECTIONS_PER_SEGMENT {
            if offset + SECTION_DESCRIPTOR_SIZE > segment.file_size {
                warn!(segment = segment.segment_number, offset, "Section chain runs past end of segment");
                return Ok(());
            }

            let section = Self::read_section_descriptor(file, offset)?;
            let data_offset = offset + SECTION_DESCRIPTOR_SIZE;
            let data_size = section.size.saturating_sub(SECTION_DESCRIPTOR_SIZE);
            trace!(
                segment = segment.segment_number,
                offset,
                section = %section.section_type,
                size = section.size,
                "Section"
            );

            match section.section_type.as_str() {
                "header" | "header2" => {
                    let utf16 = section.section_type == "header2";
                    let slot = if utf16 { &mut walk.header2 } else { &mut walk.header };
                    if slot.is_none() {
                        let data = read_bytes_at(file, data_offset, data_size.min(MAX_HEADER_SIZE) as usize)?;
                        match decode_header_section(&data, utf16) {
                            Ok(fields) => *slot = Some(fields),
                            Err(e) => warn!(section = %section.section_type, "Unreadable header section: {}", e),
                        }
                    }
                }
                "volume" | "disk" => {
                    if walk.volume.is_none() {
                        walk.volume = Some(Self::read_volume_section(file, data_offset)?);
                    }
                }
                "table" => {
                    let table = Self::read_table_section(file, data_offset, data_size)?;
                    trace!(entries = table.offsets.len(), base_offset = table.base_offset, "Table section");
                    walk.chunk_table.extend(table.offsets.iter().map(|&raw| ChunkLocation {
                        segment_index,
                        offset: table.base_offset + (raw & !COMPRESSED_FLAG) as u64,
                        compressed: raw & COMPRESSED_FLAG != 0,
                    }));
                }
                "hash" => {
                    let data = read_bytes_at(file, data_offset, 16)?;
                    Self::push_hash(&mut walk.stored_hashes, "MD5", &data);
                }
                "digest" => {
                    let data = read_bytes_at(file, data_offset, 36)?;
                    Self::push_hash(&mut walk.stored_hashes, "MD5", &data[..16]);
                    Self::push_hash(&mut walk.stored_hashes, "SHA1", &data[16..36]);
                }
                "next" | "done" => return Ok(()),
                // table2 mirrors table; sectors is reached through the table offsets
                _ => {}
            }

            if section.next_offset <= offset {
                return Ok(());
            }
            offset = section.next_offset;
        }

        Err(format!("more than {} sections in one segment", MAX_SECTIONS_PER_SEGMENT))
    }

    /// Record a stored hash; all-zero digests mean "not computed"
    fn push_hash(hashes: &mut Vec<StoredImageHash>, algorithm: &str, digest: &[u8]) {
        if digest.iter().all(|&b| b == 0) || hashes.iter().any(|h| h.algorithm == algorithm) {
            return;
        }
        hashes.push(StoredImageHash {
            algorithm: algorithm.to_string(),
            hash: hex::encode(digest),
        });
    }

    // =========================================================================
    // Chunk Access
    // =========================================================================

    /// Read a chunk by global index (like libewf_handle_read_buffer)
    fn read_chunk(&mut self, chunk_index: usize) -> Result<Arc<Vec<u8>>, ReadError> {
        if let Some(cached) = self.chunk_cache.get(chunk_index) {
            return Ok(cached);
        }

        let chunk_size = self.volume.chunk_size();
        let image_offset = chunk_index as u64 * chunk_size as u64;
        let corrupt = |reason: String| ReadError::Corrupt {
            offset: image_offset,
            reason,
        };

        let expected_len = (self.volume.media_size() - image_offset).min(chunk_size as u64) as usize;
        let location = *self
            .chunk_table
            .get(chunk_index)
            .ok_or_else(|| corrupt(format!("chunk {} is not in any table", chunk_index)))?;
        let file_index = self.segments[location.segment_index].file_index;

        let file = self
            .segment_files
            .handle(file_index)
            .map_err(|source| ReadError::Io {
                offset: image_offset,
                source,
            })?;
        file.seek(SeekFrom::Start(location.offset))
            .map_err(|source| ReadError::Io {
                offset: image_offset,
                source,
            })?;

        let mut chunk_data = if location.compressed {
            let limited = file.take(chunk_size as u64 * 2 + 1024);
            let mut decoder = ZlibDecoder::new(std::io::BufReader::with_capacity(65536, limited));
            let mut decompressed = Vec::with_capacity(chunk_size);
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| corrupt(format!("chunk {} decompression failed: {}", chunk_index, e)))?;
            decompressed
        } else {
            let mut uncompressed = vec![0u8; expected_len];
            file.read_exact(&mut uncompressed)
                .map_err(|source| ReadError::Io {
                    offset: image_offset,
                    source,
                })?;
            uncompressed
        };

        // Truncate last chunk if needed
        if chunk_data.len() < expected_len {
            return Err(corrupt(format!(
                "chunk {} holds {} bytes, expected {}",
                chunk_index,
                chunk_data.len(),
                expected_len
            )));
        }
        chunk_data.truncate(expected_len);

        Ok(self.chunk_cache.insert(chunk_index, chunk_data))
    }

    pub fn volume(&self) -> &VolumeSection {
        &self.volume
    }

    pub fn segment_paths(&self) -> &[PathBuf] {
        self.segment_files.paths()
    }

    pub fn stored_hashes(&self) -> &[StoredImageHash] {
        &self.stored_hashes
    }

    // =========================================================================
    // Section Reading Helper Methods
    // =========================================================================

    fn read_section_descriptor(file: &mut File, offset: u64) -> Result<SectionDescriptor, String> {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| format!("Seek failed: {}", e))?;

        let mut section_type = [0u8; 16];
        file.read_exact(&mut section_type)
            .map_err(|e| format!("Read section type failed: {}", e))?;

        let next_offset = read_u64_le(file)?;
        let size = read_u64_le(file)?;

        Ok(SectionDescriptor {
            section_type: String::from_utf8_lossy(&section_type)
                .trim_matches('\0')
                .to_string(),
            next_offset,
            size,
        })
    }

    fn read_volume_section(file: &mut File, offset: u64) -> Result<VolumeSection, String> {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| format!("Seek failed: {}", e))?;

        let _media_and_padding = read_u32_le(file)?;
        let chunk_count = read_u32_le(file)?;
        let sectors_per_chunk = read_u32_le(file)?;
        let bytes_per_sector = read_u32_le(file)?;
        let sector_count = read_u64_le(file)?;

        trace!(chunk_count, sectors_per_chunk, bytes_per_sector, sector_count, "Volume section");

        Ok(VolumeSection {
            chunk_count,
            sectors_per_chunk,
            bytes_per_sector,
            sector_count,
        })
    }

    /// `data_size` excludes the section descriptor
    fn read_table_section(file: &mut File, offset: u64, data_size: u64) -> Result<TableSection, String> {
        let header = read_bytes_at(file, offset, TABLE_HEADER_SIZE as usize)?;
        let entry_count = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let room = data_size.saturating_sub(TABLE_HEADER_SIZE) / 4;
        if entry_count as u64 > room {
            return Err(format!(
                "table lists {} entries but its {}-byte section holds at most {}",
                entry_count, data_size, room
            ));
        }
        let mut base = [0u8; 8];
        base.copy_from_slice(&header[8..16]);
        let base_offset = u64::from_le_bytes(base);

        let mut offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            offsets.push(read_u32_le(file)?);
        }

        Ok(TableSection { base_offset, offsets })
    }
}

impl ReadAt for EwfImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        let chunk_size = self.volume.chunk_size() as u64;
        let media_size = self.volume.media_size();

        let mut total_read = 0usize;
        while total_read < buf.len() {
            let position = offset + total_read as u64;
            if position >= media_size {
                break;
            }
            let chunk_index = (position / chunk_size) as usize;
            let within = (position % chunk_size) as usize;

            let chunk = self.read_chunk(chunk_index)?;
            let available = chunk.len().saturating_sub(within);
            if available == 0 {
                break;
            }
            let n = available.min(buf.len() - total_read);
            buf[total_read..total_read + n].copy_from_slice(&chunk[within..within + n]);
            total_read += n;
        }

        Ok(total_read)
    }

    fn size(&self) -> u64 {
        self.volume.media_size()
    }
}

impl ImageSource for EwfImage {
    fn header_values(&self) -> Vec<(String, String)> {
        self.header.clone()
    }

    fn hash_values(&self) -> Vec<(String, String)> {
        self.stored_hashes
            .iter()
            .map(|h| (h.algorithm.clone(), h.hash.clone()))
            .collect()
    }

    fn media_info(&self) -> Option<MediaInfo> {
        Some(MediaInfo {
            bytes_per_sector: self.volume.bytes_per_sector,
            sector_count: self.volume.sector_count,
            total_size: self.volume.media_size(),
        })
    }

    fn close(&mut self) {
        self.chunk_cache.clear();
        self.segment_files.release();
    }
}
