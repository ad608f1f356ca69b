// GUID Partition Table: header at LBA 1, entry array in array order

use tracing::trace;

use super::{table_sector, RawPartition};
use crate::common::binary::{slice_at, u32_le, u64_le, utf16le_to_string};
use crate::common::SECTOR_SIZE;
use crate::container::ReadAt;
use crate::error::LayoutOpenError;

const KIND: &str = "GPT";
const SIGNATURE: &[u8; 8] = b"EFI PART";
const MAX_ENTRIES: u32 = 4096;
const MIN_ENTRY_SIZE: usize = 128;
const MAX_ENTRY_SIZE: usize = 4096;

fn invalid(reason: impl Into<String>) -> LayoutOpenError {
    LayoutOpenError::Volume {
        kind: KIND,
        reason: reason.into(),
    }
}

/// Format mixed-endian GUID bytes
pub(crate) fn format_guid(bytes: &[u8]) -> String {
    if bytes.len() < 16 {
        return hex::encode(bytes);
    }
    format!(
        "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        u16::from_le_bytes([bytes[4], bytes[5]]),
        u16::from_le_bytes([bytes[6], bytes[7]]),
        bytes[8],
        bytes[9],
        bytes[10],
        bytes[11],
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15]
    )
}

pub(crate) fn read_partitions(source: &mut dyn ReadAt) -> Result<Vec<RawPartition>, LayoutOpenError> {
    let header = table_sector(source, 1, KIND)?;
    if &header[0..8] != SIGNATURE {
        return Err(invalid("missing EFI PART signature at LBA 1"));
    }

    let entries_lba = u64_le(&header, 72).map_err(invalid)?;
    let entry_count = u32_le(&header, 80).map_err(invalid)?;
    let entry_size = u32_le(&header, 84).map_err(invalid)? as usize;
    if entry_size < MIN_ENTRY_SIZE
        || entry_size > MAX_ENTRY_SIZE
        || entry_size % MIN_ENTRY_SIZE != 0
        || entry_count > MAX_ENTRIES
    {
        return Err(invalid(format!(
            "implausible entry array ({} entries of {} bytes)",
            entry_count, entry_size
        )));
    }
    trace!(entries_lba, entry_count, entry_size, "GPT header");

    let array_offset = entries_lba
        .checked_mul(SECTOR_SIZE)
        .ok_or_else(|| invalid(format!("entry array LBA {} out of range", entries_lba)))?;
    // Both factors are capped above, so this cannot overflow.
    let array_len = entry_count as usize * entry_size;
    let array_end = array_offset
        .checked_add(array_len as u64)
        .filter(|&end| end <= source.size())
        .ok_or_else(|| {
            invalid(format!(
                "entry array at byte {} ({} bytes) extends past the {}-byte image",
                array_offset,
                array_len,
                source.size()
            ))
        })?;
    trace!(array_offset, array_end, "GPT entry array");

    let mut array = vec![0u8; array_len];
    source
        .read_exact_at(array_offset, &mut array)
        .map_err(|e| invalid(format!("entry array unreadable: {}", e)))?;

    let mut partitions = Vec::new();
    for entry in array.chunks_exact(entry_size) {
        let type_guid = slice_at(entry, 0, 16).map_err(invalid)?;
        if type_guid.iter().all(|&b| b == 0) {
            continue;
        }
        let first_lba = u64_le(entry, 32).map_err(invalid)?;
        let last_lba = u64_le(entry, 40).map_err(invalid)?;
        let name = utf16le_to_string(slice_at(entry, 56, 72).map_err(invalid)?);

        partitions.push(RawPartition {
            description: if name.trim().is_empty() {
                format_guid(type_guid)
            } else {
                name
            },
            start_sector: first_lba,
            length_sectors: last_lba.saturating_add(1).saturating_sub(first_lba),
        });
    }

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::gpt_disk;

    #[test]
    fn test_named_and_unnamed_entries() {
        let mut disk = gpt_disk(&[("EFI system", 2048, 4095), ("", 4096, 8191)]);
        let parts = read_partitions(&mut disk).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].description, "EFI system");
        assert_eq!(parts[0].start_sector, 2048);
        assert_eq!(parts[0].length_sectors, 2048);
        // Basic data partition type GUID
        assert_eq!(parts[1].description, "ebd0a0a2-b9e5-4433-87c0-68b6b72699c7");
    }

    #[test]
    fn test_oversized_entries_rejected() {
        let mut disk = gpt_disk(&[("EFI system", 2048, 4095)]);
        disk[512 + 80..512 + 84].copy_from_slice(&4096u32.to_le_bytes());
        disk[512 + 84..512 + 88].copy_from_slice(&0x4000_0000u32.to_le_bytes());
        assert!(matches!(
            read_partitions(&mut disk),
            Err(LayoutOpenError::Volume { kind: "GPT", .. })
        ));

        disk[512 + 84..512 + 88].copy_from_slice(&200u32.to_le_bytes());
        assert!(read_partitions(&mut disk).is_err());
    }

    #[test]
    fn test_entry_array_out_of_range() {
        let mut disk = gpt_disk(&[("EFI system", 2048, 4095)]);
        disk[512 + 72..512 + 80].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
        assert!(matches!(
            read_partitions(&mut disk),
            Err(LayoutOpenError::Volume { kind: "GPT", .. })
        ));

        // Array in range of the multiply but past the end of the image
        disk[512 + 72..512 + 80].copy_from_slice(&1000u64.to_le_bytes());
        assert!(read_partitions(&mut disk).is_err());
    }

    #[test]
    fn test_missing_header() {
        let mut disk = vec![0u8; 4096];
        assert!(read_partitions(&mut disk).is_err());
    }
}
