// Shared binary reading utilities for container and layout parsers
//
// File-based readers are used by the EWF section walker; slice readers are
// used by partition table and boot sector parsers that work on whole sectors.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

// =============================================================================
// File Readers (from current position)
// =============================================================================

/// Read u32 little-endian from file at current position
pub fn read_u32_le(file: &mut File) -> Result<u32, String> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)
        .map_err(|e| format!("Failed to read u32: {}", e))?;
    Ok(u32::from_le_bytes(buf))
}

/// Read u64 little-endian from file at current position
pub fn read_u64_le(file: &mut File) -> Result<u64, String> {
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)
        .map_err(|e| format!("Failed to read u64: {}", e))?;
    Ok(u64::from_le_bytes(buf))
}

/// Read exact bytes at specific offset
pub fn read_bytes_at(file: &mut File, offset: u64, length: usize) -> Result<Vec<u8>, String> {
    if length == 0 {
        return Ok(Vec::new());
    }
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| format!("Failed to seek to offset {}: {}", offset, e))?;
    let mut buf = vec![0u8; length];
    file.read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {} bytes at {}: {}", length, offset, e))?;
    Ok(buf)
}

// =============================================================================
// Slice Readers
// =============================================================================

fn field<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], String> {
    buf.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| format!("Field at offset {} exceeds {}-byte buffer", offset, buf.len()))
}

pub fn u16_le(buf: &[u8], offset: usize) -> Result<u16, String> {
    field(buf, offset).map(u16::from_le_bytes)
}

pub fn u32_le(buf: &[u8], offset: usize) -> Result<u32, String> {
    field(buf, offset).map(u32::from_le_bytes)
}

pub fn u64_le(buf: &[u8], offset: usize) -> Result<u64, String> {
    field(buf, offset).map(u64::from_le_bytes)
}

pub fn u16_be(buf: &[u8], offset: usize) -> Result<u16, String> {
    field(buf, offset).map(u16::from_be_bytes)
}

pub fn u32_be(buf: &[u8], offset: usize) -> Result<u32, String> {
    field(buf, offset).map(u32::from_be_bytes)
}

/// Borrow `length` bytes starting at `offset`
pub fn slice_at(buf: &[u8], offset: usize, length: usize) -> Result<&[u8], String> {
    buf.get(offset..offset + length)
        .ok_or_else(|| format!("Range {}..{} exceeds {}-byte buffer", offset, offset + length, buf.len()))
}

// =============================================================================
// String Helpers
// =============================================================================

/// Convert bytes to null-terminated string
pub fn bytes_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

/// Decode UTF-16LE code units, stopping at the first NUL
pub fn utf16le_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}
