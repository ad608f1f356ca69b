//! Document assembly: typed tables to string tables, optionally obfuscated
//!
//! Obfuscation replaces every cell, header cells included, with the standard
//! padded base64 of its bytes. Table titles stay readable. Byte cells are
//! encoded from their raw bytes, so names that are not UTF-8 decode back
//! exactly.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use tracing::debug;

use super::table::{Cell, TabularDocument};

/// A table ready for rendering: every cell is a string
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedTable {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The ordered tables of one report
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AssembledDocument {
    pub title: String,
    pub tables: Vec<RenderedTable>,
    pub obfuscated: bool,
}

impl AssembledDocument {
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

pub fn obfuscate_cell(cell: &Cell) -> String {
    BASE64.encode(cell.raw_bytes())
}

/// Inverse of [`obfuscate_cell`]
pub fn decode_obfuscated(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(value)
}

/// Lay out `tables` in order; row count and shape are preserved
pub fn assemble(title: &str, tables: &[TabularDocument], obfuscate: bool) -> AssembledDocument {
    let tables: Vec<RenderedTable> = tables
        .iter()
        .map(|table| RenderedTable {
            title: table.title().to_string(),
            header: table
                .header()
                .iter()
                .map(|h| if obfuscate { BASE64.encode(h) } else { h.clone() })
                .collect(),
            rows: table
                .rows()
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| {
                            if obfuscate {
                                obfuscate_cell(cell)
                            } else {
                                cell.to_display_string()
                            }
                        })
                        .collect()
                })
                .collect(),
        })
        .collect();

    let document = AssembledDocument {
        title: title.to_string(),
        tables,
        obfuscated: obfuscate,
    };
    debug!(
        tables = document.tables.len(),
        rows = document.row_count(),
        obfuscate,
        "Document assembled"
    );
    document
}
