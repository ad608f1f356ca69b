// FAT12/16/32 root directory reader
//
// Boot sector (BPB) layout, 0-based offsets:
//   11 bytes/sector (u16)   13 sectors/cluster (u8)   14 reserved sectors (u16)
//   16 FAT count (u8)       17 root entries (u16)     19 total sectors 16 (u16)
//   22 FAT size 16 (u16)    32 total sectors 32 (u32) 36 FAT size 32 (u32)
//   44 root cluster (u32, FAT32 only)                 510 0x55AA

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::trace;

use super::{FileSystem, MetaRecord, MetaType, RawDirRecord};
use crate::common::binary::{u16_le, u32_le};
use crate::container::ReadAt;
use crate::error::ReadError;

const ENTRY_SIZE: usize = 32;
const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_LONG_NAME: u8 = 0x0F;
const DELETED: u8 = 0xE5;
const FAT32_EOC: u32 = 0x0FFF_FFF8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

pub struct FatFileSystem {
    offset: u64,
    fat_type: FatType,
    bytes_per_sector: u64,
    sectors_per_cluster: u64,
    reserved_sectors: u64,
    fat_count: u64,
    fat_size: u64,
    root_entries: u64,
    root_cluster: u32,
    cluster_count: u64,
}

impl FatFileSystem {
    /// Parse and sanity-check the boot sector at `offset`
    pub fn open(source: &mut dyn ReadAt, offset: u64) -> Result<Self, String> {
        let mut boot = [0u8; 512];
        source
            .read_exact_at(offset, &mut boot)
            .map_err(|e| format!("boot sector unreadable: {}", e))?;

        if boot[510] != 0x55 || boot[511] != 0xAA {
            return Err("no boot sector signature".into());
        }

        let bytes_per_sector = u16_le(&boot, 11)? as u64;
        let sectors_per_cluster = boot[13] as u64;
        let reserved_sectors = u16_le(&boot, 14)? as u64;
        let fat_count = boot[16] as u64;
        let root_entries = u16_le(&boot, 17)? as u64;
        let total_16 = u16_le(&boot, 19)? as u64;
        let fat_size_16 = u16_le(&boot, 22)? as u64;
        let total_32 = u32_le(&boot, 32)? as u64;
        let fat_size_32 = u32_le(&boot, 36)? as u64;

        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            return Err(format!("unsupported sector size {}", bytes_per_sector));
        }
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            return Err(format!("invalid sectors per cluster {}", sectors_per_cluster));
        }
        if reserved_sectors == 0 || fat_count == 0 {
            return Err("not a FAT boot sector".into());
        }

        let fat_size = if fat_size_16 != 0 { fat_size_16 } else { fat_size_32 };
        let total_sectors = if total_16 != 0 { total_16 } else { total_32 };
        let root_dir_sectors = (root_entries * ENTRY_SIZE as u64).div_ceil(bytes_per_sector);
        let first_data_sector = reserved_sectors + fat_count * fat_size + root_dir_sectors;
        if fat_size == 0 || total_sectors <= first_data_sector {
            return Err("FAT geometry does not fit the volume".into());
        }
        let cluster_count = (total_sectors - first_data_sector) / sectors_per_cluster;

        let fat_type = if cluster_count < 4085 {
            FatType::Fat12
        } else if cluster_count < 65525 {
            FatType::Fat16
        } else {
            FatType::Fat32
        };
        let root_cluster = if fat_type == FatType::Fat32 {
            u32_le(&boot, 44)?
        } else {
            0
        };

        trace!(?fat_type, cluster_count, root_entries, "FAT boot sector");
        Ok(Self {
            offset,
            fat_type,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            fat_size,
            root_entries,
            root_cluster,
            cluster_count,
        })
    }

    fn cluster_bytes(&self) -> u64 {
        self.bytes_per_sector * self.sectors_per_cluster
    }

    fn first_data_sector(&self) -> u64 {
        let root_dir_sectors = (self.root_entries * ENTRY_SIZE as u64).div_ceil(self.bytes_per_sector);
        self.reserved_sectors + self.fat_count * self.fat_size + root_dir_sectors
    }

    /// Fixed root directory region (FAT12/16)
    fn read_fixed_root(&self, source: &mut dyn ReadAt) -> Result<Vec<u8>, ReadError> {
        let start = self.offset + (self.reserved_sectors + self.fat_count * self.fat_size) * self.bytes_per_sector;
        let mut buf = vec![0u8; self.root_entries as usize * ENTRY_SIZE];
        source.read_exact_at(start, &mut buf)?;
        Ok(buf)
    }

    /// Root directory cluster chain (FAT32)
    fn read_root_chain(&self, source: &mut dyn ReadAt) -> Result<Vec<u8>, ReadError> {
        let fat_start = self.offset + self.reserved_sectors * self.bytes_per_sector;
        let data_start = self.offset + self.first_data_sector() * self.bytes_per_sector;

        let mut buf = Vec::new();
        let mut visited = HashSet::new();
        let mut cluster = self.root_cluster;
        while cluster >= 2 && (cluster as u64) < self.cluster_count + 2 && visited.insert(cluster) {
            let mut data = vec![0u8; self.cluster_bytes() as usize];
            source.read_exact_at(data_start + (cluster as u64 - 2) * self.cluster_bytes(), &mut data)?;
            buf.extend_from_slice(&data);

            let mut entry = [0u8; 4];
            source.read_exact_at(fat_start + cluster as u64 * 4, &mut entry)?;
            let next = u32::from_le_bytes(entry) & 0x0FFF_FFFF;
            if next >= FAT32_EOC {
                break;
            }
            cluster = next;
        }
        Ok(buf)
    }
}

impl FileSystem for FatFileSystem {
    fn type_name(&self) -> &'static str {
        match self.fat_type {
            FatType::Fat12 => "FAT12",
            FatType::Fat16 => "FAT16",
            FatType::Fat32 => "FAT32",
        }
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn root_records(&mut self, source: &mut dyn ReadAt) -> Result<Vec<RawDirRecord>, ReadError> {
        let region = match self.fat_type {
            FatType::Fat32 => self.read_root_chain(source)?,
            _ => self.read_fixed_root(source)?,
        };
        Ok(parse_directory(&region))
    }
}

// =============================================================================
// Directory entry decoding
// =============================================================================

/// Decode a directory region; stops at the first end-of-directory marker
fn parse_directory(region: &[u8]) -> Vec<RawDirRecord> {
    let mut records = Vec::new();
    let mut long_name: Vec<(u8, Vec<u16>)> = Vec::new();
    let mut long_checksum: Option<u8> = None;

    for entry in region.chunks_exact(ENTRY_SIZE) {
        let first = entry[0];
        let attr = entry[11];

        if first == 0x00 {
            break;
        }
        if attr & 0x3F == ATTR_LONG_NAME {
            if first != DELETED {
                long_name.push((first & 0x1F, lfn_units(entry)));
                long_checksum = Some(entry[13]);
            }
            continue;
        }
        if first == DELETED {
            let mut name = short_name(entry);
            if let Some(b) = name.first_mut() {
                *b = b'_';
            }
            records.push(RawDirRecord {
                name: Some(name),
                meta: None,
            });
            long_name.clear();
            continue;
        }
        if attr & ATTR_VOLUME_ID != 0 || first == b'.' {
            long_name.clear();
            continue;
        }

        let short = short_name(entry);
        let name = match long_checksum {
            Some(sum) if sum == short_checksum(entry) && !long_name.is_empty() => {
                long_name.sort_by_key(|(seq, _)| *seq);
                let units: Vec<u16> = long_name
                    .iter()
                    .flat_map(|(_, units)| units.iter().copied())
                    .take_while(|&u| u != 0x0000 && u != 0xFFFF)
                    .collect();
                String::from_utf16_lossy(&units).into_bytes()
            }
            _ => short,
        };
        long_name.clear();
        long_checksum = None;

        records.push(RawDirRecord {
            name: Some(name),
            meta: Some(MetaRecord {
                meta_type: if attr & ATTR_DIRECTORY != 0 {
                    MetaType::Directory
                } else {
                    MetaType::Regular
                },
                size: u32::from_le_bytes([entry[28], entry[29], entry[30], entry[31]]) as u64,
                created: fat_timestamp(
                    u16::from_le_bytes([entry[16], entry[17]]),
                    u16::from_le_bytes([entry[14], entry[15]]),
                ),
                modified: fat_timestamp(
                    u16::from_le_bytes([entry[24], entry[25]]),
                    u16::from_le_bytes([entry[22], entry[23]]),
                ),
            }),
        });
    }

    records
}

/// The 13 UTF-16 units of one long-name fragment
fn lfn_units(entry: &[u8]) -> Vec<u16> {
    [1..11, 14..26, 28..32]
        .into_iter()
        .flat_map(|range| entry[range].chunks_exact(2).map(|p| u16::from_le_bytes([p[0], p[1]])).collect::<Vec<_>>())
        .collect()
}

fn short_checksum(entry: &[u8]) -> u8 {
    entry[..11]
        .iter()
        .fold(0u8, |sum, &b| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b))
}

/// 8.3 name as stored, honouring the NT lower-case flags in byte 12
fn short_name(entry: &[u8]) -> Vec<u8> {
    let case_flags = entry[12];
    let mut base: Vec<u8> = entry[0..8].to_vec();
    if base[0] == 0x05 {
        base[0] = DELETED;
    }
    while base.last() == Some(&b' ') {
        base.pop();
    }
    let mut ext: Vec<u8> = entry[8..11].to_vec();
    while ext.last() == Some(&b' ') {
        ext.pop();
    }
    if case_flags & 0x08 != 0 {
        base.make_ascii_lowercase();
    }
    if case_flags & 0x10 != 0 {
        ext.make_ascii_lowercase();
    }

    if !ext.is_empty() {
        base.push(b'.');
        base.extend_from_slice(&ext);
    }
    base
}

/// FAT date/time (stored local time, read as UTC) to epoch seconds; 0 when unset
fn fat_timestamp(date: u16, time: u16) -> i64 {
    let year = 1980 + (date >> 9) as i32;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;
    let hour = (time >> 11) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}
