//! TrueType font lookup for the report renderer and the watermark stamper
//!
//! genpdf expects a family as `<Name>-Regular.ttf`, `<Name>-Bold.ttf`,
//! `<Name>-Italic.ttf` and `<Name>-BoldItalic.ttf` in one directory.

use std::path::{Path, PathBuf};

use genpdf::fonts;
use tracing::debug;

use crate::error::SealError;

/// Family names tried in every search directory
const FAMILIES: &[&str] = &["LiberationSans", "DejaVuSans", "Arial", "arial"];

/// Well-known system font directories (macOS, Linux, Windows)
const SYSTEM_FONT_DIRS: &[&str] = &[
    "/Library/Fonts",
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/dejavu",
    "C:\\Windows\\Fonts",
];

/// Configured directories first, then `./fonts`, the user font dir, system locations
pub fn search_dirs(configured: &[PathBuf]) -> Vec<PathBuf> {
    configured
        .iter()
        .cloned()
        .chain(std::iter::once(PathBuf::from("./fonts")))
        .chain(dirs::font_dir())
        .chain(SYSTEM_FONT_DIRS.iter().map(PathBuf::from))
        .collect()
}

/// Load the first complete font family found
pub fn load_font_family(configured: &[PathBuf]) -> Result<fonts::FontFamily<fonts::FontData>, SealError> {
    for dir in search_dirs(configured) {
        for family in FAMILIES {
            if let Ok(font) = fonts::from_files(&dir, family, None) {
                debug!(dir = %dir.display(), family, "Font family loaded");
                return Ok(font);
            }
        }
    }
    Err(no_fonts(configured))
}

/// Path of the first regular face found
pub fn find_regular_face(configured: &[PathBuf]) -> Result<PathBuf, SealError> {
    search_dirs(configured)
        .iter()
        .flat_map(|dir| FAMILIES.iter().map(move |family| regular_face(dir, family)))
        .find(|path| path.is_file())
        .ok_or_else(|| no_fonts(configured))
}

fn regular_face(dir: &Path, family: &str) -> PathBuf {
    dir.join(format!("{}-Regular.ttf", family))
}

fn no_fonts(configured: &[PathBuf]) -> SealError {
    SealError::Font(format!(
        "no TrueType family ({}) found in {} configured dir(s) or the default font locations",
        FAMILIES.join(", "),
        configured.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_configured_dirs_come_first() {
        let order = search_dirs(&[PathBuf::from("/opt/case-fonts")]);
        assert_eq!(order[0], PathBuf::from("/opt/case-fonts"));
        assert_eq!(order[1], PathBuf::from("./fonts"));
        assert!(order.ends_with(&SYSTEM_FONT_DIRS.iter().map(PathBuf::from).collect::<Vec<_>>()));
    }

    #[test]
    fn test_regular_face_in_configured_dir() {
        let dir = TempDir::new().unwrap();
        let face = dir.path().join("DejaVuSans-Regular.ttf");
        std::fs::write(&face, b"not parsed here").unwrap();
        assert_eq!(find_regular_face(&[dir.path().to_path_buf()]).unwrap(), face);
    }
}
