// Sun VTOC disk label (SPARC): sector 0, magic 0xDABE at byte 508

use super::{table_sector, RawPartition};
use crate::common::binary::{u16_be, u32_be};
use crate::container::ReadAt;
use crate::error::LayoutOpenError;

const KIND: &str = "SUN";
const MAGIC: u16 = 0xDABE;
const SLOT_COUNT: usize = 8;
const TAGS_OFFSET: usize = 142;
const TRACKS_OFFSET: usize = 436;
const SECTORS_OFFSET: usize = 438;
const SLOTS_OFFSET: usize = 444;

fn invalid(reason: impl Into<String>) -> LayoutOpenError {
    LayoutOpenError::Volume {
        kind: KIND,
        reason: reason.into(),
    }
}

fn tag_name(tag: u16) -> String {
    let name = match tag {
        0x00 => "Unassigned",
        0x01 => "boot",
        0x02 => "/",
        0x03 => "swap",
        0x04 => "/usr",
        0x05 => "backup",
        0x06 => "stand",
        0x07 => "/var",
        0x08 => "/home",
        0x09 => "alt sector",
        0x0A => "cachefs",
        0x82 => "Linux swap",
        0x83 => "Linux",
        other => return format!("Unknown Type (0x{:04X})", other),
    };
    name.to_string()
}

pub(crate) fn read_partitions(source: &mut dyn ReadAt) -> Result<Vec<RawPartition>, LayoutOpenError> {
    let label = table_sector(source, 0, KIND)?;
    if u16_be(&label, 508).map_err(invalid)? != MAGIC {
        return Err(invalid("missing 0xDABE label magic"));
    }

    let tracks = u16_be(&label, TRACKS_OFFSET).map_err(invalid)? as u64;
    let sectors = u16_be(&label, SECTORS_OFFSET).map_err(invalid)? as u64;
    let cylinder_sectors = tracks * sectors;
    if cylinder_sectors == 0 {
        return Err(invalid("label geometry has zero heads or sectors"));
    }

    (0..SLOT_COUNT)
        .map(|slot| {
            let start_cylinder = u32_be(&label, SLOTS_OFFSET + slot * 8).map_err(invalid)? as u64;
            let length = u32_be(&label, SLOTS_OFFSET + slot * 8 + 4).map_err(invalid)? as u64;
            let tag = u16_be(&label, TAGS_OFFSET + slot * 4).map_err(invalid)?;
            Ok(RawPartition {
                description: tag_name(tag),
                start_sector: start_cylinder * cylinder_sectors,
                length_sectors: length,
            })
        })
        .collect()
}
