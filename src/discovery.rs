//! Evidence image discovery under a case directory

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::common::segments::segment_number;
use crate::container::ContainerKind;
use crate::error::ContainerOpenError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredImage {
    pub path: PathBuf,
    pub kind: ContainerKind,
    pub size: u64,
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

fn scan_dir(dir: &Path, extensions: &[String], found: &mut Vec<DiscoveredImage>) -> Result<(), ContainerOpenError> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)
        .map_err(|source| ContainerOpenError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Failed to read directory entry: {}", e);
                None
            }
        })
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            warn!("Failed to get file type for {:?}", path);
            continue;
        };

        if file_type.is_dir() {
            if let Err(e) = scan_dir(&path, extensions, found) {
                warn!("Skipping directory: {}", e);
            }
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        // macOS resource forks
        if !file_type.is_file() || filename.starts_with("._") || !matches_extension(&path, extensions) {
            continue;
        }

        let first_segment = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(segment_number)
            == Some(1);
        let kind = if first_segment {
            ContainerKind::Segmented
        } else {
            ContainerKind::Raw
        };
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        debug!(path = %path.display(), %kind, size, "Evidence image found");
        found.push(DiscoveredImage { path, kind, size });
    }
    Ok(())
}

/// Files below `root` whose extension matches one of `extensions` (case-insensitive)
pub fn discover_evidence(root: &Path, extensions: &[String]) -> Result<Vec<DiscoveredImage>, ContainerOpenError> {
    if !root.is_dir() {
        return Err(ContainerOpenError::NotFound {
            path: root.to_path_buf(),
        });
    }
    let mut found = Vec::new();
    scan_dir(root, extensions, &mut found)?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_matching_images_in_walk_order() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("case").join("usb");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("laptop.E01"), b"evf").unwrap();
        fs::write(root.path().join("laptop.E02"), b"evf").unwrap();
        fs::write(root.path().join("._laptop.E01"), b"fork").unwrap();
        fs::write(root.path().join("notes.txt"), b"text").unwrap();
        fs::write(nested.join("mac.DMG"), b"dmg image").unwrap();
        fs::write(nested.join("stick.e01"), b"evf").unwrap();

        let extensions = vec!["E01".to_string(), "dmg".to_string()];
        let found = discover_evidence(root.path(), &extensions).unwrap();
        let paths: Vec<PathBuf> = found.iter().map(|d| d.path.clone()).collect();
        assert_eq!(
            paths,
            vec![nested.join("mac.DMG"), nested.join("stick.e01"), root.path().join("laptop.E01")]
        );
        assert_eq!(found[0].kind, ContainerKind::Raw);
        assert_eq!(found[0].size, 9);
        assert_eq!(found[1].kind, ContainerKind::Segmented);
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            discover_evidence(Path::new("/nonexistent/case"), &["E01".to_string()]),
            Err(ContainerOpenError::NotFound { .. })
        ));
    }
}
