//! Rasterization: rendered PDF bytes to one RGB image per page

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use image::RgbImage;
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, instrument};

use crate::error::SealError;

pub trait Rasterizer: Send + Sync {
    /// Pages in page order
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<RgbImage>, SealError>;
}

/// Runs an external `pdftoppm`-compatible program inside a scoped temp directory
#[derive(Clone, Debug)]
pub struct PdftoppmRasterizer {
    program: String,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

fn page_file_regex() -> &'static Regex {
    static PAGE_REGEX: OnceLock<Regex> = OnceLock::new();
    PAGE_REGEX.get_or_init(|| Regex::new(r"^page-(\d+)\.png$").expect("Invalid page file regex"))
}

/// Page images written by the rasterizer, ordered by page number
fn collect_pages(dir: &Path) -> Result<Vec<RgbImage>, SealError> {
    let mut numbered = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| SealError::Rasterize(format!("cannot list output: {}", e)))?;
    for entry in entries {
        let entry = entry.map_err(|e| SealError::Rasterize(e.to_string()))?;
        let name = entry.file_name();
        let Some(caps) = name.to_str().and_then(|n| page_file_regex().captures(n)) else {
            continue;
        };
        if let Ok(number) = caps[1].parse::<u32>() {
            numbered.push((number, entry.path()));
        }
    }
    numbered.sort_by_key(|(number, _)| *number);

    numbered
        .into_iter()
        .map(|(number, path)| {
            image::open(&path)
                .map(|img| img.to_rgb8())
                .map_err(|e| SealError::Rasterize(format!("page {} unreadable: {}", number, e)))
        })
        .collect()
}

impl Rasterizer for PdftoppmRasterizer {
    #[instrument(skip(self, pdf), fields(program = %self.program, bytes = pdf.len()))]
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<RgbImage>, SealError> {
        let workdir = TempDir::new()?;
        let input = workdir.path().join("input.pdf");
        fs::write(&input, pdf)?;

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(workdir.path().join("page"))
            .output()
            .map_err(|e| SealError::Rasterize(format!("cannot run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(SealError::Rasterize(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = collect_pages(workdir.path())?;
        debug!(pages = pages.len(), "Rasterized");
        Ok(pages)
    }
}
