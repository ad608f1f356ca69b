//! Metadata extraction: partitions, root directory entries, acquisition metadata
//!
//! All three enumerations keep source order. Nothing is sorted; the on-disk
//! order is itself evidence.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::container::{ContainerKind, EvidenceContainer, MediaInfo, ReadAt};
use crate::error::{LayoutOpenError, ReadError, SealError};
use crate::filesystem::{open_filesystem, FileSystem, RawDirRecord};
use crate::report::{Cell, TabularDocument};
use crate::volume::{open_volume, PartitionKind, VolumeLayout};

pub const PARTITION_HEADER: [&str; 4] = ["Index", "Type", "Offset Start (Sectors)", "Length (Sectors)"];
pub const DIRECTORY_HEADER: [&str; 5] = ["Name", "Type", "Size", "Create Date", "Modify Date"];
pub const ACQUISITION_HEADER: [&str; 2] = ["Field", "Value"];

// =============================================================================
// Entry Types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    pub index: usize,
    pub description: String,
    pub start_sector: u64,
    pub length_sectors: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    Dir,
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Dir => f.write_str("DIR"),
            EntryKind::File => f.write_str("FILE"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Raw name bytes, possibly not UTF-8
    pub name: Vec<u8>,
    pub kind: EntryKind,
    pub size: u64,
    pub created: i64,
    pub modified: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionMetadata {
    /// Header fields in the container's native order
    pub headers: Vec<(String, String)>,
    /// Hash fields, keys prefixed with "Acquisition "
    pub hashes: Vec<(String, String)>,
    pub media: Option<MediaInfo>,
}

/// What could be opened at the requested location
pub enum LayoutView {
    Volume(VolumeLayout),
    FileSystem(Box<dyn FileSystem>),
}

// =============================================================================
// Enumerations
// =============================================================================

/// Open a volume layout of `kind`, or a file system at `offset` when no kind is declared
#[instrument(skip(source))]
pub fn enumerate_layout(
    source: &mut dyn ReadAt,
    kind: Option<PartitionKind>,
    offset: u64,
) -> Result<LayoutView, LayoutOpenError> {
    match kind {
        Some(kind) => open_volume(source, kind).map(LayoutView::Volume),
        None => open_filesystem(source, offset).map(LayoutView::FileSystem),
    }
}

/// One entry per partition, in table order
pub fn partition_entries(layout: &VolumeLayout) -> Vec<PartitionEntry> {
    layout
        .entries
        .iter()
        .map(|e| PartitionEntry {
            index: e.index,
            description: e.description.clone(),
            start_sector: e.start_sector,
            length_sectors: e.length_sectors,
        })
        .collect()
}

/// Root directory entries; records lacking a name or metadata are skipped
#[instrument(skip_all, fields(fs = fs.type_name(), offset = fs.offset()))]
pub fn list_root_directory(fs: &mut dyn FileSystem, source: &mut dyn ReadAt) -> Result<Vec<DirectoryEntry>, ReadError> {
    let directory_type = fs.directory_type();
    let records = fs.root_records(source)?;
    let total = records.len();

    let entries: Vec<DirectoryEntry> = records
        .into_iter()
        .filter_map(|record| directory_entry(record, directory_type))
        .collect();

    debug!(total, listed = entries.len(), skipped = total - entries.len(), "Root directory listed");
    Ok(entries)
}

fn directory_entry(record: RawDirRecord, directory_type: crate::filesystem::MetaType) -> Option<DirectoryEntry> {
    let (Some(name), Some(meta)) = (record.name, record.meta) else {
        return None;
    };
    Some(DirectoryEntry {
        name,
        kind: if meta.meta_type == directory_type {
            EntryKind::Dir
        } else {
            EntryKind::File
        },
        size: meta.size,
        created: meta.created,
        modified: meta.modified,
    })
}

/// Header and hash fields of a segmented container; `None` for raw images
pub fn acquisition_metadata(container: &EvidenceContainer) -> Option<AcquisitionMetadata> {
    if container.kind() != ContainerKind::Segmented {
        return None;
    }
    let metadata = AcquisitionMetadata {
        headers: container.header_values(),
        hashes: container
            .hash_values()
            .into_iter()
            .map(|(algorithm, value)| (format!("Acquisition {}", algorithm), value))
            .collect(),
        media: container.media_info(),
    };
    info!(
        headers = metadata.headers.len(),
        hashes = metadata.hashes.len(),
        "Acquisition metadata read"
    );
    Some(metadata)
}

// =============================================================================
// Tables
// =============================================================================

pub fn partition_table(entries: &[PartitionEntry]) -> Result<TabularDocument, SealError> {
    let mut table = TabularDocument::new("Partitions", &PARTITION_HEADER);
    for entry in entries {
        table.push_row(vec![
            Cell::from(entry.index),
            Cell::from(entry.description.as_str()),
            Cell::from(entry.start_sector),
            Cell::from(entry.length_sectors),
        ])?;
    }
    Ok(table)
}

pub fn directory_table(entries: &[DirectoryEntry]) -> Result<TabularDocument, SealError> {
    let mut table = TabularDocument::new("Root Directory", &DIRECTORY_HEADER);
    for entry in entries {
        table.push_row(vec![
            Cell::Bytes(entry.name.clone()),
            Cell::from(entry.kind.to_string()),
            Cell::from(entry.size),
            Cell::from(entry.created),
            Cell::from(entry.modified),
        ])?;
    }
    Ok(table)
}

pub fn acquisition_table(metadata: &AcquisitionMetadata) -> Result<TabularDocument, SealError> {
    let mut table = TabularDocument::new("Acquisition Metadata", &ACQUISITION_HEADER);
    for (key, value) in metadata.headers.iter().chain(metadata.hashes.iter()) {
        table.push_row(vec![Cell::from(key.as_str()), Cell::from(value.as_str())])?;
    }
    if let Some(media) = &metadata.media {
        table.push_row(vec![Cell::from("Bytes per Sector"), Cell::from(media.bytes_per_sector as u64)])?;
        table.push_row(vec![Cell::from("Number of Sectors"), Cell::from(media.sector_count)])?;
        table.push_row(vec![Cell::from("Total Size"), Cell::from(media.total_size)])?;
    }
    Ok(table)
}
