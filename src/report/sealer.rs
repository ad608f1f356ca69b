//! Report sealing
//!
//! ```text
//! AssembledDocument ─render─▶ PDF bytes ─rasterize─▶ page images
//!        ─stamp(watermark)─▶ images ─reassemble─▶ Document ─RC4 R3─▶ bytes
//!        ─NamedTempFile in output dir─▶ persist as <base>_<timestamp>.pdf
//! ```
//!
//! Everything up to the final persist happens in memory or in scoped
//! temporary directories. The only file ever created under the final name is
//! the encrypted artifact.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout, Text};
use genpdf::{style, Alignment, Element, SimplePageDecorator};
use lopdf::Document;
use md5::{Digest, Md5};
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use super::assembler::AssembledDocument;
use super::clock::{ReportClock, ReportTimestamp};
use super::fonts;
use super::pdf_writer::{document_bytes, images_to_document};
use super::raster::{PdftoppmRasterizer, Rasterizer};
use super::security::{derive_owner_password, Rc4Security};
use super::watermark::{FontStamper, PageStamper};
use crate::config::PipelineConfig;
use crate::error::SealError;

// =============================================================================
// Rendering
// =============================================================================

pub trait DocumentRenderer: Send + Sync {
    /// Render to PDF bytes
    fn render(&self, document: &AssembledDocument) -> Result<Vec<u8>, SealError>;
}

/// Renders tables with genpdf
pub struct GenpdfRenderer {
    font_dirs: Vec<PathBuf>,
}

impl GenpdfRenderer {
    pub fn new(font_dirs: Vec<PathBuf>) -> Self {
        Self { font_dirs }
    }
}

fn render_error(e: impl std::fmt::Display) -> SealError {
    SealError::Render(e.to_string())
}

impl DocumentRenderer for GenpdfRenderer {
    fn render(&self, document: &AssembledDocument) -> Result<Vec<u8>, SealError> {
        let font_family = fonts::load_font_family(&self.font_dirs)?;
        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(&document.title);
        doc.set_minimal_conformance();
        doc.set_font_size(9);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        doc.push(
            Paragraph::new(&document.title)
                .aligned(Alignment::Center)
                .styled(style::Style::new().bold().with_font_size(14)),
        );
        doc.push(Break::new(1.0));

        for table in &document.tables {
            doc.push(Paragraph::new(&table.title).styled(style::Style::new().bold().with_font_size(11)));
            doc.push(Break::new(0.5));

            let mut layout = TableLayout::new(vec![1; table.header.len().max(1)]);
            layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

            let mut header = layout.row();
            for name in &table.header {
                header.push_element(Text::new(name.as_str()).styled(style::Style::new().bold()));
            }
            header.push().map_err(render_error)?;

            for row in &table.rows {
                let mut line = layout.row();
                for value in row {
                    line.push_element(Text::new(value.as_str()));
                }
                line.push().map_err(render_error)?;
            }

            doc.push(layout);
            doc.push(Break::new(1.0));
        }

        let mut bytes = Vec::new();
        doc.render(&mut bytes).map_err(render_error)?;
        Ok(bytes)
    }
}

// =============================================================================
// Sealer
// =============================================================================

/// A persisted, encrypted report
#[derive(Clone, Debug)]
pub struct SealedReport {
    pub path: PathBuf,
    pub watermark: String,
    pub page_count: usize,
    pub timestamp: ReportTimestamp,
}

pub struct Sealer {
    renderer: Box<dyn DocumentRenderer>,
    rasterizer: Box<dyn Rasterizer>,
    stamper: Box<dyn PageStamper>,
    clock: Arc<ReportClock>,
    dpi: u32,
    output_dir: PathBuf,
}

impl Sealer {
    pub fn new(
        renderer: Box<dyn DocumentRenderer>,
        rasterizer: Box<dyn Rasterizer>,
        stamper: Box<dyn PageStamper>,
        clock: Arc<ReportClock>,
        dpi: u32,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            rasterizer,
            stamper,
            clock,
            dpi,
            output_dir: output_dir.into(),
        }
    }

    /// genpdf renderer, external rasterizer, TrueType stamper
    pub fn from_config(config: &PipelineConfig, clock: Arc<ReportClock>) -> Result<Self, SealError> {
        let face = fonts::find_regular_face(&config.font_dirs)?;
        Ok(Self::new(
            Box::new(GenpdfRenderer::new(config.font_dirs.clone())),
            Box::new(PdftoppmRasterizer::new(config.rasterizer_program.clone())),
            Box::new(FontStamper::from_file(&face)?),
            clock,
            config.raster_dpi,
            config.output_dir.clone(),
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render, watermark, encrypt and persist `document` as `<base_name>_<timestamp>.pdf`
    #[instrument(skip(self, document, password), fields(tables = document.tables.len()))]
    pub fn seal(&self, document: &AssembledDocument, password: &str, base_name: &str) -> Result<SealedReport, SealError> {
        if password.is_empty() {
            return Err(SealError::NoPassword);
        }

        let timestamp = self.clock.now();
        let watermark = timestamp.watermark_text();
        let (mut sealed, page_count) = self.build(document, password, base_name, &timestamp)?;
        let bytes = document_bytes(&mut sealed)?;

        let path = self
            .output_dir
            .join(format!("{}_{}.pdf", base_name, timestamp.file_suffix()));
        self.persist(&bytes, &path)?;

        info!(path = %path.display(), pages = page_count, bytes = bytes.len(), "Report sealed");
        Ok(SealedReport {
            path,
            watermark,
            page_count,
            timestamp,
        })
    }

    /// The encrypted document, not yet serialized
    pub(crate) fn build(
        &self,
        document: &AssembledDocument,
        password: &str,
        base_name: &str,
        timestamp: &ReportTimestamp,
    ) -> Result<(Document, usize), SealError> {
        let watermark = timestamp.watermark_text();

        let rendered = self.renderer.render(document)?;
        let mut pages = self.rasterizer.rasterize(&rendered, self.dpi)?;
        if pages.is_empty() {
            return Err(SealError::NoPages);
        }
        for page in pages.iter_mut() {
            self.stamper.stamp(page, &watermark)?;
        }

        let mut sealed = images_to_document(&pages, self.dpi, &document.title)?;

        let mut hasher = Md5::new();
        hasher.update(base_name.as_bytes());
        hasher.update(watermark.as_bytes());
        hasher.update(rendered.len().to_le_bytes());
        let id0: [u8; 16] = hasher.finalize().into();

        Rc4Security::new(password, &derive_owner_password(password), id0).apply(&mut sealed)?;
        Ok((sealed, pages.len()))
    }

    fn persist(&self, bytes: &[u8], path: &Path) -> Result<(), SealError> {
        let persist_error = |source| SealError::Persist {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(&self.output_dir).map_err(persist_error)?;
        let mut staged = NamedTempFile::new_in(&self.output_dir).map_err(persist_error)?;
        staged.write_all(bytes).map_err(persist_error)?;
        staged.as_file().sync_all().map_err(persist_error)?;
        staged.persist_noclobber(path).map_err(|e| {
            warn!(path = %path.display(), "Final report name already taken or not writable");
            persist_error(e.error)
        })?;
        Ok(())
    }
}
