//! Content search over marker-scoped document directories
//!
//! Only directories whose name matches the marker (case-insensitively) are
//! searched, at any depth below the root; inside a marker directory every
//! document with the configured extension is taken, again at any depth.
//! A document whose text cannot be extracted is recorded as a failure and
//! the batch carries on.

mod text;

pub use text::{LopdfTextExtractor, TextExtractor};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{SealError, SearchError};
use crate::report::{Cell, TabularDocument};

pub const RESULTS_HEADER: [&str; 3] = ["Word", "Document", "Count"];

/// Per-document counts, in query word order
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentHits {
    pub path: PathBuf,
    pub counts: Vec<(String, usize)>,
}

impl DocumentHits {
    pub fn count(&self, word: &str) -> Option<usize> {
        self.counts.iter().find(|(w, _)| w == word).map(|(_, c)| *c)
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    /// Successfully searched documents, in discovery order
    pub documents: Vec<DocumentHits>,
    /// Documents skipped because extraction failed, in discovery order
    pub failures: Vec<SearchError>,
}

// =============================================================================
// Discovery
// =============================================================================

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>, SearchError> {
    let mut entries = fs::read_dir(dir)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|source| SearchError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Every matching file below `dir`, symlinked directories not followed
fn collect_documents(dir: &Path, extension: &str, found: &mut Vec<PathBuf>) {
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory: {}", e);
            return;
        }
    };
    for entry in entries {
        let Ok(file_type) = entry.file_type() else { continue };
        let path = entry.path();
        if file_type.is_dir() {
            collect_documents(&path, extension, found);
        } else if file_type.is_file() && has_extension(&path, extension) {
            found.push(path);
        }
    }
}

fn walk_for_markers(dir: &Path, marker: &str, extension: &str, found: &mut Vec<PathBuf>) -> Result<(), SearchError> {
    for entry in sorted_entries(dir)? {
        let Ok(file_type) = entry.file_type() else { continue };
        if !file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if entry.file_name().to_str().is_some_and(|n| n.eq_ignore_ascii_case(marker)) {
            debug!(dir = %path.display(), "Marker directory");
            collect_documents(&path, extension, found);
        }
        if let Err(e) = walk_for_markers(&path, marker, extension, found) {
            warn!("Skipping unreadable directory: {}", e);
        }
    }
    Ok(())
}

/// Documents under marker directories of `root`, each listed once, in walk order
#[instrument]
pub fn discover_documents(root: &Path, marker: &str, extension: &str) -> Result<Vec<PathBuf>, SearchError> {
    if !root.is_dir() {
        return Err(SearchError::RootNotFound {
            path: root.to_path_buf(),
        });
    }
    let mut found = Vec::new();
    walk_for_markers(root, marker, extension, &mut found)?;

    let mut seen = HashSet::new();
    found.retain(|p| seen.insert(p.clone()));
    debug!(documents = found.len(), "Documents discovered");
    Ok(found)
}

// =============================================================================
// Counting
// =============================================================================

/// Case-insensitive substring count; overlapping occurrences each count
pub fn count_occurrences(text: &str, word: &str) -> usize {
    let haystack = text.to_lowercase();
    let needle = word.to_lowercase();
    if needle.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&needle) {
        count += 1;
        let at = start + pos;
        start = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
    }
    count
}

pub fn count_words(text: &str, words: &[String]) -> Vec<(String, usize)> {
    words.iter().map(|w| (w.clone(), count_occurrences(text, w))).collect()
}

// =============================================================================
// Search
// =============================================================================

/// Search every discovered document for `words`
#[instrument(skip(extractor, words), fields(words = words.len()))]
pub fn search(
    root: &Path,
    words: &[String],
    marker: &str,
    extension: &str,
    extractor: &dyn TextExtractor,
) -> Result<SearchOutcome, SearchError> {
    if words.is_empty() || words.iter().any(|w| w.trim().is_empty()) {
        return Err(SearchError::EmptyQuery);
    }
    let documents = discover_documents(root, marker, extension)?;

    let results: Vec<Result<DocumentHits, SearchError>> = documents
        .par_iter()
        .map(|path| {
            let pages = extractor.extract_pages(path).map_err(|reason| SearchError::Extract {
                path: path.clone(),
                reason,
            })?;
            let text = pages.join("\n");
            Ok(DocumentHits {
                path: path.clone(),
                counts: count_words(&text, words),
            })
        })
        .collect();

    let mut outcome = SearchOutcome {
        documents: Vec::with_capacity(results.len()),
        failures: Vec::new(),
    };
    for result in results {
        match result {
            Ok(hits) => outcome.documents.push(hits),
            Err(e) => {
                warn!("Skipping document: {}", e);
                outcome.failures.push(e);
            }
        }
    }

    info!(
        searched = outcome.documents.len(),
        skipped = outcome.failures.len(),
        "Search complete"
    );
    Ok(outcome)
}

/// One row per non-zero (word, document, count), document-major
pub fn results_table(outcome: &SearchOutcome) -> Result<TabularDocument, SealError> {
    let mut table = TabularDocument::new("Search Results", &RESULTS_HEADER);
    for hits in &outcome.documents {
        for (word, count) in hits.counts.iter().filter(|(_, c)| *c > 0) {
            table.push_row(vec![
                Cell::from(word.as_str()),
                Cell::from(hits.path.display().to_string()),
                Cell::from(*count),
            ])?;
        }
    }
    Ok(table)
}
