//! Page text extraction

use std::path::Path;

use lopdf::Document;
use tracing::trace;

pub trait TextExtractor: Send + Sync {
    /// Text of every page, in page order
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, String>;
}

/// Text extraction through lopdf's content stream decoder
#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfTextExtractor;

impl TextExtractor for LopdfTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, String> {
        let doc = Document::load(path).map_err(|e| format!("cannot parse document: {}", e))?;

        doc.get_pages()
            .keys()
            .map(|&number| {
                let text = doc
                    .extract_text(&[number])
                    .map_err(|e| format!("page {}: {}", number, e))?;
                trace!(page = number, chars = text.len(), "Page text extracted");
                Ok(text)
            })
            .collect()
    }
}
