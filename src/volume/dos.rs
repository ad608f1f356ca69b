// DOS partition table: MBR at LBA 0, logical partitions through the EBR chain

use std::collections::HashSet;

use tracing::{trace, warn};

use super::{table_sector, RawPartition};
use crate::common::binary::u32_le;
use crate::container::ReadAt;
use crate::error::LayoutOpenError;

const KIND: &str = "DOS";
const TABLE_OFFSET: usize = 446;
const MAX_LOGICAL: usize = 128;

struct Slot {
    partition_type: u8,
    start: u64,
    length: u64,
}

fn has_signature(sector: &[u8]) -> bool {
    sector[510] == 0x55 && sector[511] == 0xAA
}

fn read_slots(sector: &[u8]) -> Result<Vec<Slot>, LayoutOpenError> {
    (0..4)
        .map(|i| {
            let offset = TABLE_OFFSET + i * 16;
            let field = |at: usize| {
                u32_le(sector, offset + at).map_err(|reason| LayoutOpenError::Volume { kind: KIND, reason })
            };
            Ok(Slot {
                partition_type: sector[offset + 4],
                start: field(8)? as u64,
                length: field(12)? as u64,
            })
        })
        .collect()
}

fn is_extended(partition_type: u8) -> bool {
    matches!(partition_type, 0x05 | 0x0F | 0x85)
}

/// Partition type byte to description
pub(crate) fn type_name(partition_type: u8) -> String {
    let name = match partition_type {
        0x01 => "FAT12",
        0x04 | 0x06 | 0x0E => "FAT16",
        0x07 => "NTFS/exFAT",
        0x0B | 0x0C => "FAT32",
        0x82 => "Linux swap",
        0x83 => "Linux",
        0x8E => "Linux LVM",
        0xA5 => "FreeBSD",
        0xA6 => "OpenBSD",
        0xA8 => "Mac OS X",
        0xAF => "HFS+",
        0xEE => "GPT Protective MBR",
        0xEF => "EFI System",
        0xFD => "Linux RAID",
        other => return format!("Unknown Type (0x{:02X})", other),
    };
    name.to_string()
}

pub(crate) fn read_partitions(source: &mut dyn ReadAt) -> Result<Vec<RawPartition>, LayoutOpenError> {
    let mbr = table_sector(source, 0, KIND)?;
    if !has_signature(&mbr) {
        return Err(LayoutOpenError::Volume {
            kind: KIND,
            reason: "missing 0x55AA boot signature".into(),
        });
    }

    let mut primaries = Vec::new();
    let mut logicals = Vec::new();
    for slot in read_slots(&mbr)? {
        if slot.partition_type == 0 {
            continue;
        }
        if is_extended(slot.partition_type) {
            read_ebr_chain(source, slot.start, &mut logicals);
            continue;
        }
        primaries.push(RawPartition {
            description: type_name(slot.partition_type),
            start_sector: slot.start,
            length_sectors: slot.length,
        });
    }

    primaries.extend(logicals);
    Ok(primaries)
}

/// Follow the EBR linked list; a broken link ends the chain
fn read_ebr_chain(source: &mut dyn ReadAt, extended_base: u64, out: &mut Vec<RawPartition>) {
    let mut visited = HashSet::new();
    let mut ebr_lba = extended_base;

    while out.len() < MAX_LOGICAL && visited.insert(ebr_lba) {
        let ebr = match table_sector(source, ebr_lba, KIND) {
            Ok(sector) if has_signature(&sector) => sector,
            Ok(_) => {
                warn!(ebr_lba, "EBR without boot signature, chain ends");
                return;
            }
            Err(e) => {
                warn!(ebr_lba, "EBR unreadable, chain ends: {}", e);
                return;
            }
        };
        let Ok(slots) = read_slots(&ebr) else { return };

        let logical = &slots[0];
        if logical.partition_type != 0 && !is_extended(logical.partition_type) {
            trace!(ebr_lba, start = ebr_lba + logical.start, "Logical partition");
            out.push(RawPartition {
                description: type_name(logical.partition_type),
                start_sector: ebr_lba + logical.start,
                length_sectors: logical.length,
            });
        }

        let link = &slots[1];
        if !is_extended(link.partition_type) || link.start == 0 {
            return;
        }
        ebr_lba = extended_base + link.start;
    }
}
