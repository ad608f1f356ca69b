//! Tabular documents: a header row plus data rows of typed cells

use std::fmt;

use serde::Serialize;

use crate::error::SealError;

/// One cell value
///
/// `Bytes` holds values that may not be valid UTF-8 (file names). They are
/// displayed lossily but obfuscated from the raw bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Cell {
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    UInt(u64),
}

impl Cell {
    pub fn to_display_string(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Cell::Int(v) => v.to_string(),
            Cell::UInt(v) => v.to_string(),
        }
    }

    /// The exact bytes this cell stands for
    pub fn raw_bytes(&self) -> Vec<u8> {
        match self {
            Cell::Bytes(b) => b.clone(),
            other => other.to_display_string().into_bytes(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::UInt(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::UInt(value as u64)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

/// A titled table whose every row has as many cells as the header
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TabularDocument {
    title: String,
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TabularDocument {
    pub fn new(title: impl Into<String>, header: &[&str]) -> Self {
        Self {
            title: title.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a data row; a row of the wrong width is rejected
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), SealError> {
        if row.len() != self.header.len() {
            return Err(SealError::Shape {
                table: self.title.clone(),
                row: self.rows.len() + 1,
                expected: self.header.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows, header excluded
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
