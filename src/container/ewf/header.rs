//! EWF header / header2 section decoding
//!
//! Both sections hold a zlib-compressed, tab-separated table:
//!
//! ```text
//! 1
//! main
//! c   n   a   e   t   av  ov  m   u   p   r
//! <one value per key>
//!
//! ```
//!
//! `header` is ASCII, `header2` is UTF-16LE. Keys are short codes that are
//! expanded to libewf's header value identifiers.

use std::io::Read;

use chrono::{DateTime, NaiveDate};
use flate2::read::ZlibDecoder;

/// Expand a header key code to its identifier
fn field_name(code: &str) -> String {
    match code {
        "c" => "case_number",
        "n" => "evidence_number",
        "a" => "description",
        "e" => "examiner_name",
        "t" => "notes",
        "av" => "acquiry_software_version",
        "ov" => "acquiry_operating_system",
        "m" => "acquiry_date",
        "u" => "system_date",
        "p" => "password",
        "r" => "compression_level",
        "md" => "model",
        "sn" => "serial_number",
        "l" => "device_label",
        "pid" => "process_identifier",
        "ext" => "extents",
        other => other,
    }
    .to_string()
}

/// Dates are stored either as "YYYY M D h m s" (header) or epoch seconds (header2)
fn normalise_date(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_digit()) {
        if let Some(dt) = value.parse::<i64>().ok().and_then(|s| DateTime::from_timestamp(s, 0)) {
            return dt.format("%Y-%m-%d %H:%M:%S").to_string();
        }
        return value.to_string();
    }

    let parts: Vec<u32> = value
        .split_whitespace()
        .filter_map(|p| p.parse().ok())
        .collect();
    if let [year, month, day, hour, minute, second] = parts[..] {
        if let Some(dt) = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
        {
            return dt.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    value.to_string()
}

/// Parse the decompressed header text into ordered `(identifier, value)` pairs
pub(crate) fn parse_header_text(text: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = text.lines().map(|l| l.trim_end_matches('\r')).collect();
    let Some(main) = lines.iter().position(|l| l.trim() == "main") else {
        return Vec::new();
    };
    let (Some(keys), Some(values)) = (lines.get(main + 1), lines.get(main + 2)) else {
        return Vec::new();
    };

    keys.split('\t')
        .zip(values.split('\t'))
        .filter_map(|(key, value)| {
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() || (key == "p" && value == "0") {
                return None;
            }
            let value = match key {
                "m" | "u" => normalise_date(value),
                _ => value.to_string(),
            };
            Some((field_name(key), value))
        })
        .collect()
}

/// Decode a header or header2 section payload
pub(crate) fn decode_header_section(data: &[u8], utf16: bool) -> Result<Vec<(String, String)>, String> {
    let raw = if data.first() == Some(&0x78) {
        decompress_zlib(data)?
    } else {
        data.to_vec()
    };

    let text = if utf16 {
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .skip_while(|&unit| unit == 0xFEFF)
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(&raw).to_string()
    };

    Ok(parse_header_text(&text))
}

/// Simple zlib decompression using flate2
pub(crate) fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| format!("Decompression failed: {}", e))?;
    Ok(decompressed)
}
