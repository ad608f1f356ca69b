//! Synthetic evidence fixtures built in code for the test suite

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::common::{compute_hash, segments::segment_extension, HashAlgorithm};

// =============================================================================
// EWF v1 writer
// =============================================================================

const EVF_SIGNATURE: &[u8; 8] = b"EVF\x09\x0d\x0a\xff\x00";
const DESCRIPTOR_SIZE: usize = 76;
const BYTES_PER_SECTOR: u32 = 512;

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Append a section; `last` makes the descriptor point at itself
fn push_section(buf: &mut Vec<u8>, kind: &str, data: &[u8], last: bool) {
    let offset = buf.len() as u64;
    let size = (DESCRIPTOR_SIZE + data.len()) as u64;
    let next = if last { offset } else { offset + size };

    let mut kind_bytes = [0u8; 16];
    kind_bytes[..kind.len()].copy_from_slice(kind.as_bytes());
    buf.extend_from_slice(&kind_bytes);
    buf.extend_from_slice(&next.to_le_bytes());
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(data);
}

/// Builder for multi-segment E01 images
pub(crate) struct EwfFixture {
    data: Vec<u8>,
    sectors_per_chunk: u32,
    chunks_per_segment: usize,
    compressed: bool,
    header: Vec<(String, String)>,
    md5: bool,
    digest: bool,
}

impl EwfFixture {
    /// `data` must be a whole number of 512-byte sectors
    pub fn new(data: Vec<u8>) -> Self {
        assert_eq!(data.len() % BYTES_PER_SECTOR as usize, 0);
        Self {
            data,
            sectors_per_chunk: 4,
            chunks_per_segment: usize::MAX,
            compressed: true,
            header: Vec::new(),
            md5: false,
            digest: false,
        }
    }

    pub fn chunks_per_segment(mut self, count: usize) -> Self {
        self.chunks_per_segment = count.max(1);
        self
    }

    pub fn uncompressed(mut self) -> Self {
        self.compressed = false;
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.header.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_md5(mut self) -> Self {
        self.md5 = true;
        self
    }

    pub fn with_digest(mut self) -> Self {
        self.digest = true;
        self
    }

    fn header_text(&self) -> String {
        let keys: Vec<&str> = self.header.iter().map(|(k, _)| k.as_str()).collect();
        let values: Vec<&str> = self.header.iter().map(|(_, v)| v.as_str()).collect();
        format!("1\nmain\n{}\n{}\n\n", keys.join("\t"), values.join("\t"))
    }

    fn volume_data(&self, chunk_count: u32) -> Vec<u8> {
        let mut volume = vec![0u8; 1052];
        volume[0] = 1; // fixed disk
        volume[4..8].copy_from_slice(&chunk_count.to_le_bytes());
        volume[8..12].copy_from_slice(&self.sectors_per_chunk.to_le_bytes());
        volume[12..16].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes());
        let sectors = (self.data.len() / BYTES_PER_SECTOR as usize) as u64;
        volume[16..24].copy_from_slice(&sectors.to_le_bytes());
        volume
    }

    /// Write the segment files and return the path of the first (.E01)
    pub fn write(&self, dir: &Path, base: &str) -> PathBuf {
        let chunk_size = (self.sectors_per_chunk * BYTES_PER_SECTOR) as usize;
        let chunks: Vec<&[u8]> = self.data.chunks(chunk_size).collect();
        let groups: Vec<&[&[u8]]> = chunks.chunks(self.chunks_per_segment).collect();

        for (index, group) in groups.iter().enumerate() {
            let number = index as u16 + 1;
            let is_last = index + 1 == groups.len();

            let mut buf = Vec::new();
            buf.extend_from_slice(EVF_SIGNATURE);
            buf.push(1);
            buf.extend_from_slice(&number.to_le_bytes());
            buf.extend_from_slice(&[0, 0]);

            if index == 0 {
                if !self.header.is_empty() {
                    push_section(&mut buf, "header", &zlib(self.header_text().as_bytes()), false);
                }
                push_section(&mut buf, "volume", &self.volume_data(chunks.len() as u32), false);
            }

            // sectors: chunk blobs, offsets recorded relative to the segment start
            let sectors_data_start = buf.len() + DESCRIPTOR_SIZE;
            let mut sectors = Vec::new();
            let mut entries = Vec::new();
            for chunk in group.iter() {
                let offset = (sectors_data_start + sectors.len()) as u32;
                if self.compressed {
                    sectors.extend_from_slice(&zlib(chunk));
                    entries.push(offset | 0x8000_0000);
                } else {
                    sectors.extend_from_slice(chunk);
                    sectors.extend_from_slice(&[0u8; 4]); // adler32 slot
                    entries.push(offset);
                }
            }
            push_section(&mut buf, "sectors", &sectors, false);

            let mut table = Vec::new();
            table.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            table.extend_from_slice(&[0u8; 4]);
            table.extend_from_slice(&0u64.to_le_bytes());
            table.extend_from_slice(&[0u8; 8]);
            for entry in &entries {
                table.extend_from_slice(&entry.to_le_bytes());
            }
            table.extend_from_slice(&[0u8; 4]);
            push_section(&mut buf, "table", &table, false);
            push_section(&mut buf, "table2", &table, false);

            if is_last {
                let md5 = hex::decode(compute_hash(&self.data, HashAlgorithm::Md5)).unwrap();
                if self.md5 {
                    let mut hash = md5.clone();
                    hash.extend_from_slice(&[0u8; 20]);
                    push_section(&mut buf, "hash", &hash, false);
                }
                if self.digest {
                    let mut digest = md5.clone();
                    digest.extend(hex::decode(compute_hash(&self.data, HashAlgorithm::Sha1)).unwrap());
                    digest.extend_from_slice(&[0u8; 44]);
                    push_section(&mut buf, "digest", &digest, false);
                }
                push_section(&mut buf, "done", &[], true);
            } else {
                push_section(&mut buf, "next", &[], true);
            }

            let ext = segment_extension(number as u32).unwrap();
            std::fs::write(dir.join(format!("{}.{}", base, ext)), buf).unwrap();
        }

        dir.join(format!("{}.E01", base))
    }
}

// =============================================================================
// Partition tables
// =============================================================================

/// Write one 16-byte MBR/EBR slot
pub(crate) fn write_slot(sector: &mut [u8], slot: usize, partition_type: u8, start: u32, length: u32) {
    let offset = 446 + slot * 16;
    sector[offset + 4] = partition_type;
    sector[offset + 8..offset + 12].copy_from_slice(&start.to_le_bytes());
    sector[offset + 12..offset + 16].copy_from_slice(&length.to_le_bytes());
}

/// A 512-byte MBR with the given `(type, start, length)` slots
pub(crate) fn mbr_sector(slots: &[(u8, u32, u32)]) -> Vec<u8> {
    let mut sector = vec![0u8; 512];
    for (i, &(partition_type, start, length)) in slots.iter().enumerate() {
        write_slot(&mut sector, i, partition_type, start, length);
    }
    sector[510] = 0x55;
    sector[511] = 0xAA;
    sector
}

const BASIC_DATA_GUID: [u8; 16] = [
    0xA2, 0xA0, 0xD0, 0xEB, 0xE5, 0xB9, 0x33, 0x44, 0x87, 0xC0, 0x68, 0xB6, 0xB7, 0x26, 0x99, 0xC7,
];

/// Protective MBR, GPT header and a 128-entry array of `(name, first, last)`
pub(crate) fn gpt_disk(entries: &[(&str, u64, u64)]) -> Vec<u8> {
    let mut disk = vec![0u8; 34 * 512];
    disk[..512].copy_from_slice(&mbr_sector(&[(0xEE, 1, u32::MAX)]));

    let header = &mut disk[512..1024];
    header[0..8].copy_from_slice(b"EFI PART");
    header[72..80].copy_from_slice(&2u64.to_le_bytes());
    header[80..84].copy_from_slice(&128u32.to_le_bytes());
    header[84..88].copy_from_slice(&128u32.to_le_bytes());

    for (i, &(name, first, last)) in entries.iter().enumerate() {
        let entry = &mut disk[1024 + i * 128..1024 + (i + 1) * 128];
        entry[0..16].copy_from_slice(&BASIC_DATA_GUID);
        entry[16] = i as u8 + 1;
        entry[32..40].copy_from_slice(&first.to_le_bytes());
        entry[40..48].copy_from_slice(&last.to_le_bytes());
        for (j, unit) in name.encode_utf16().take(36).enumerate() {
            entry[56 + j * 2..58 + j * 2].copy_from_slice(&unit.to_le_bytes());
        }
    }
    disk
}

/// Apple Partition Map with 512-byte blocks; the map's own entry comes first
pub(crate) fn apm_disk(entries: &[(&str, u32, u32)]) -> Vec<u8> {
    let map_entries = entries.len() as u32 + 1;
    let mut disk = vec![0u8; (2 + entries.len()) * 512];
    disk[0..2].copy_from_slice(b"ER");
    disk[2..4].copy_from_slice(&512u16.to_be_bytes());

    let all = std::iter::once(("Apple_partition_map", 1, map_entries)).chain(entries.iter().copied());
    for (i, (partition_type, start, count)) in all.enumerate() {
        let block = &mut disk[(1 + i) * 512..(2 + i) * 512];
        block[0..2].copy_from_slice(b"PM");
        block[4..8].copy_from_slice(&map_entries.to_be_bytes());
        block[8..12].copy_from_slice(&start.to_be_bytes());
        block[12..16].copy_from_slice(&count.to_be_bytes());
        block[16..16 + partition_type.len()].copy_from_slice(partition_type.as_bytes());
        block[48..48 + partition_type.len()].copy_from_slice(partition_type.as_bytes());
    }
    disk
}

/// Sun VTOC label with `(tag, start_cylinder, length)` slots
pub(crate) fn sun_label(tracks: u16, sectors: u16, slots: &[(u16, u32, u32)]) -> Vec<u8> {
    let mut label = vec![0u8; 512];
    label[0..12].copy_from_slice(b"FIXTURE DISK");
    label[436..438].copy_from_slice(&tracks.to_be_bytes());
    label[438..440].copy_from_slice(&sectors.to_be_bytes());
    for (i, &(tag, start_cylinder, length)) in slots.iter().enumerate() {
        label[142 + i * 4..144 + i * 4].copy_from_slice(&tag.to_be_bytes());
        label[444 + i * 8..448 + i * 8].copy_from_slice(&start_cylinder.to_be_bytes());
        label[448 + i * 8..452 + i * 8].copy_from_slice(&length.to_be_bytes());
    }
    label[508..510].copy_from_slice(&0xDABEu16.to_be_bytes());
    label
}

// =============================================================================
// FAT16 volumes
// =============================================================================

/// Epoch of the 2023-05-14 10:30:00 stamp written into fixture entries
pub(crate) const FIXTURE_EPOCH: i64 = 1_684_060_200;
const FAT_DATE: u16 = 22190;
const FAT_TIME: u16 = 21440;

/// A short (8.3) directory entry; `lowercase` sets the NT case flags
pub(crate) fn fat_short_entry(name: &str, ext: &str, attr: u8, size: u32, lowercase: bool) -> [u8; 32] {
    let mut entry = [0u8; 32];
    entry[0..11].fill(b' ');
    entry[..name.len()].copy_from_slice(name.as_bytes());
    entry[8..8 + ext.len()].copy_from_slice(ext.as_bytes());
    entry[11] = attr;
    entry[12] = if lowercase { 0x18 } else { 0 };
    for at in [14usize, 22] {
        entry[at..at + 2].copy_from_slice(&FAT_TIME.to_le_bytes());
    }
    for at in [16usize, 18, 24] {
        entry[at..at + 2].copy_from_slice(&FAT_DATE.to_le_bytes());
    }
    entry[28..32].copy_from_slice(&size.to_le_bytes());
    entry
}

/// Long-name fragments for `short`, in on-disk (reverse sequence) order
pub(crate) fn fat_lfn_entries(long_name: &str, short: &[u8; 32]) -> Vec<[u8; 32]> {
    let checksum = short[..11]
        .iter()
        .fold(0u8, |sum, &b| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b));

    let mut units: Vec<u16> = long_name.encode_utf16().collect();
    units.push(0);
    while units.len() % 13 != 0 {
        units.push(0xFFFF);
    }

    let fragments: Vec<&[u16]> = units.chunks(13).collect();
    let mut entries = Vec::new();
    for (i, fragment) in fragments.iter().enumerate().rev() {
        let mut entry = [0u8; 32];
        entry[0] = (i as u8 + 1) | if i + 1 == fragments.len() { 0x40 } else { 0 };
        entry[11] = 0x0F;
        entry[13] = checksum;
        let slots = (1..11).step_by(2).chain((14..26).step_by(2)).chain((28..32).step_by(2));
        for (slot, unit) in slots.zip(fragment.iter()) {
            entry[slot..slot + 2].copy_from_slice(&unit.to_le_bytes());
        }
        entries.push(entry);
    }
    entries
}

/// The metadata area of a FAT16 volume (boot sector, two FATs, root directory)
pub(crate) fn fat16_volume(root: &[[u8; 32]]) -> Vec<u8> {
    const RESERVED: usize = 1;
    const FAT_SIZE: usize = 32;
    const ROOT_ENTRIES: usize = 512;
    let root_start = (RESERVED + 2 * FAT_SIZE) * 512;
    let mut volume = vec![0u8; root_start + ROOT_ENTRIES * 32];

    let boot = &mut volume[..512];
    boot[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    boot[3..11].copy_from_slice(b"MSDOS5.0");
    boot[11..13].copy_from_slice(&512u16.to_le_bytes());
    boot[13] = 1;
    boot[14..16].copy_from_slice(&(RESERVED as u16).to_le_bytes());
    boot[16] = 2;
    boot[17..19].copy_from_slice(&(ROOT_ENTRIES as u16).to_le_bytes());
    boot[19..21].copy_from_slice(&5097u16.to_le_bytes());
    boot[21] = 0xF8;
    boot[22..24].copy_from_slice(&(FAT_SIZE as u16).to_le_bytes());
    boot[54..62].copy_from_slice(b"FAT16   ");
    boot[510] = 0x55;
    boot[511] = 0xAA;

    for (i, entry) in root.iter().enumerate() {
        volume[root_start + i * 32..root_start + (i + 1) * 32].copy_from_slice(entry);
    }
    volume
}

// =============================================================================
// PDF documents
// =============================================================================

/// A PDF with one Helvetica text line per page
pub(crate) fn text_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

// =============================================================================
// Sealing collaborators
// =============================================================================

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use image::{Rgb, RgbImage};

use crate::error::SealError;
use crate::report::{
    AssembledDocument, DocumentRenderer, PageStamper, Rasterizer, ReportClock, Sealer, TimeSource,
};

/// A clock stuck at one instant
pub(crate) struct FixedTime(pub i64);

impl TimeSource for FixedTime {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0, 0).single().unwrap()
    }
}

/// Report clock in Europe/Warsaw starting at [`FIXTURE_EPOCH`]
pub(crate) fn fixed_clock() -> Arc<ReportClock> {
    Arc::new(ReportClock::with_source(
        chrono_tz::Europe::Warsaw,
        Box::new(FixedTime(FIXTURE_EPOCH)),
    ))
}

pub(crate) struct FakeRenderer;

impl DocumentRenderer for FakeRenderer {
    fn render(&self, document: &AssembledDocument) -> Result<Vec<u8>, SealError> {
        Ok(format!("%PDF-fake {} rows", document.row_count()).into_bytes())
    }
}

/// Produces `n` blank pages
pub(crate) struct FakeRasterizer(pub usize);

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<RgbImage>, SealError> {
        Ok((0..self.0).map(|_| RgbImage::from_pixel(60, 80, Rgb([255, 255, 255]))).collect())
    }
}

/// Remembers every watermark it was asked to draw
#[derive(Default)]
pub(crate) struct RecordingStamper(pub Arc<Mutex<Vec<String>>>);

impl PageStamper for RecordingStamper {
    fn stamp(&self, page: &mut RgbImage, text: &str) -> Result<(), SealError> {
        page.put_pixel(10, 10, Rgb([185, 185, 185]));
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A sealer with in-process collaborators writing into `dir`
pub(crate) fn fake_sealer(pages: usize, stamper: Box<dyn PageStamper>, dir: &Path) -> Sealer {
    Sealer::new(
        Box::new(FakeRenderer),
        Box::new(FakeRasterizer(pages)),
        stamper,
        fixed_clock(),
        100,
        dir,
    )
}
