//! Volume layouts - partition table interpretation of a container
//!
//! Supported tables: DOS (MBR + EBR chain), GPT, MAC (Apple Partition Map)
//! and SUN (SPARC VTOC label). Each parser reads through [`ReadAt`] only and
//! returns entries in on-disk order; [`open_volume`] assigns the ordinal
//! address in that order. Sector size is fixed at 512 bytes.

mod dos;
mod gpt;
mod mac;
mod sun;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::common::SECTOR_SIZE;
use crate::container::ReadAt;
use crate::error::{LayoutOpenError, ReadError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PartitionKind {
    Dos,
    Gpt,
    Mac,
    Sun,
}

impl PartitionKind {
    pub fn name(&self) -> &'static str {
        match self {
            PartitionKind::Dos => "DOS",
            PartitionKind::Gpt => "GPT",
            PartitionKind::Mac => "MAC",
            PartitionKind::Sun => "SUN",
        }
    }
}

impl FromStr for PartitionKind {
    type Err = LayoutOpenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DOS" | "MBR" => Ok(PartitionKind::Dos),
            "GPT" => Ok(PartitionKind::Gpt),
            "MAC" => Ok(PartitionKind::Mac),
            "SUN" => Ok(PartitionKind::Sun),
            _ => Err(LayoutOpenError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One partition as found in the table
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeEntry {
    /// Ordinal in emitted (on-disk) order
    pub index: usize,
    pub description: String,
    pub start_sector: u64,
    pub length_sectors: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct VolumeLayout {
    pub kind: PartitionKind,
    pub entries: Vec<VolumeEntry>,
}

/// Entry as produced by a table parser, before addressing
pub(crate) struct RawPartition {
    pub description: String,
    pub start_sector: u64,
    pub length_sectors: u64,
}

/// Open a volume-layout view of `source`
#[instrument(skip(source), fields(kind = %kind))]
pub fn open_volume(source: &mut dyn ReadAt, kind: PartitionKind) -> Result<VolumeLayout, LayoutOpenError> {
    let raw = match kind {
        PartitionKind::Dos => dos::read_partitions(source)?,
        PartitionKind::Gpt => gpt::read_partitions(source)?,
        PartitionKind::Mac => mac::read_partitions(source)?,
        PartitionKind::Sun => sun::read_partitions(source)?,
    };

    let entries: Vec<VolumeEntry> = raw
        .into_iter()
        .filter(|p| p.length_sectors > 0)
        .enumerate()
        .map(|(index, p)| VolumeEntry {
            index,
            description: p.description,
            start_sector: p.start_sector,
            length_sectors: p.length_sectors,
        })
        .collect();

    debug!(count = entries.len(), "Partition table read");
    Ok(VolumeLayout { kind, entries })
}

/// Read one 512-byte sector
pub(crate) fn read_sector(source: &mut dyn ReadAt, lba: u64) -> Result<Vec<u8>, ReadError> {
    let mut sector = vec![0u8; SECTOR_SIZE as usize];
    source.read_exact_at(lba * SECTOR_SIZE, &mut sector)?;
    Ok(sector)
}

/// A sector that cannot be read means the table is absent, not that the image is broken
pub(crate) fn table_sector(source: &mut dyn ReadAt, lba: u64, kind: &'static str) -> Result<Vec<u8>, LayoutOpenError> {
    read_sector(source, lba).map_err(|e| LayoutOpenError::Volume {
        kind,
        reason: format!("sector {} unreadable: {}", lba, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{apm_disk, gpt_disk, mbr_sector, sun_label};

    #[test]
    fn test_kind_parsing() {
        assert_eq!("dos".parse::<PartitionKind>().unwrap(), PartitionKind::Dos);
        assert_eq!("Gpt".parse::<PartitionKind>().unwrap(), PartitionKind::Gpt);
        assert!(matches!(
            "bsd".parse::<PartitionKind>(),
            Err(LayoutOpenError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_two_partition_dos_disk() {
        let mut disk = mbr_sector(&[(0x0C, 2048, 204800), (0x83, 206848, 2048000)]);

        let layout = open_volume(&mut disk, PartitionKind::Dos).unwrap();
        assert_eq!(
            layout.entries,
            vec![
                VolumeEntry {
                    index: 0,
                    description: "FAT32".into(),
                    start_sector: 2048,
                    length_sectors: 204800
                },
                VolumeEntry {
                    index: 1,
                    description: "Linux".into(),
                    start_sector: 206848,
                    length_sectors: 2048000
                },
            ]
        );

        // Stable across runs
        let again = open_volume(&mut disk, PartitionKind::Dos).unwrap();
        assert_eq!(again.entries, layout.entries);
    }

    #[test]
    fn test_wrong_kind_is_layout_error() {
        let mut disk = mbr_sector(&[(0x83, 2048, 4096)]);
        assert!(matches!(
            open_volume(&mut disk, PartitionKind::Gpt),
            Err(LayoutOpenError::Volume { kind: "GPT", .. })
        ));
        assert!(open_volume(&mut disk, PartitionKind::Sun).is_err());
    }

    #[test]
    fn test_each_kind_dispatches() {
        let mut gpt = gpt_disk(&[("EFI system", 2048, 4095), ("", 4096, 8191)]);
        assert_eq!(open_volume(&mut gpt, PartitionKind::Gpt).unwrap().entries.len(), 2);

        let mut apm = apm_disk(&[("Apple_HFS", 64, 1000)]);
        let mac = open_volume(&mut apm, PartitionKind::Mac).unwrap();
        assert_eq!(mac.entries.last().unwrap().description, "Apple_HFS");

        let mut sun = sun_label(16, 63, &[(2, 0, 10080), (4, 10, 5040)]);
        assert_eq!(open_volume(&mut sun, PartitionKind::Sun).unwrap().entries.len(), 2);
    }

    #[test]
    fn test_empty_image() {
        let mut empty: Vec<u8> = Vec::new();
        assert!(open_volume(&mut empty, PartitionKind::Dos).is_err());
    }
}
