// Apple Partition Map: driver descriptor at block 0, map entries from block 1

use super::RawPartition;
use crate::common::binary::{bytes_to_string, slice_at, u16_be, u32_be};
use crate::common::SECTOR_SIZE;
use crate::container::ReadAt;
use crate::error::LayoutOpenError;

const KIND: &str = "MAC";
const MAX_MAP_ENTRIES: u32 = 1024;

fn invalid(reason: impl Into<String>) -> LayoutOpenError {
    LayoutOpenError::Volume {
        kind: KIND,
        reason: reason.into(),
    }
}

fn read_block(source: &mut dyn ReadAt, block: u64, block_size: u64) -> Result<Vec<u8>, LayoutOpenError> {
    let mut buf = vec![0u8; block_size as usize];
    source
        .read_exact_at(block * block_size, &mut buf)
        .map_err(|e| invalid(format!("block {} unreadable: {}", block, e)))?;
    Ok(buf)
}

pub(crate) fn read_partitions(source: &mut dyn ReadAt) -> Result<Vec<RawPartition>, LayoutOpenError> {
    // Block size comes from the driver descriptor ("ER") when present
    let ddm = read_block(source, 0, SECTOR_SIZE)?;
    let block_size = match (&ddm[0..2], u16_be(&ddm, 2)) {
        (b"ER", Ok(size)) if size >= 512 && size % 512 == 0 => size as u64,
        _ => SECTOR_SIZE,
    };

    let first = read_block(source, 1, block_size)?;
    if &first[0..2] != b"PM" {
        return Err(invalid("missing PM signature at block 1"));
    }
    let map_entries = u32_be(&first, 4).map_err(invalid)?;
    if map_entries == 0 || map_entries > MAX_MAP_ENTRIES {
        return Err(invalid(format!("implausible map size {}", map_entries)));
    }

    let scale = block_size / SECTOR_SIZE;
    let mut partitions = Vec::new();
    for i in 0..map_entries as u64 {
        let entry = if i == 0 {
            first.clone()
        } else {
            read_block(source, 1 + i, block_size)?
        };
        if &entry[0..2] != b"PM" {
            break;
        }
        let start = u32_be(&entry, 8).map_err(invalid)? as u64;
        let count = u32_be(&entry, 12).map_err(invalid)? as u64;
        let partition_type = bytes_to_string(slice_at(&entry, 48, 32).map_err(invalid)?);

        partitions.push(RawPartition {
            description: partition_type,
            start_sector: start * scale,
            length_sectors: count * scale,
        });
    }

    Ok(partitions)
}
