// Segment discovery for EWF evidence images
//
// Segment extensions follow the EnCase/libewf scheme:
// - .E01 ... .E99
// - then .EAA ... .EZZ, .FAA ... .ZZZ (three letters, base 26)

use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Number of segments addressable by the E01 extension scheme
pub const MAX_SEGMENTS: u32 = 99 + 22 * 26 * 26;

// =============================================================================
// Extension Scheme
// =============================================================================

/// Extension (without the dot) of segment `number`, 1-based
pub fn segment_extension(number: u32) -> Option<String> {
    match number {
        0 => None,
        1..=99 => Some(format!("E{:02}", number)),
        _ if number <= MAX_SEGMENTS => {
            let k = number - 100;
            let first = (b'E' + (k / 676) as u8) as char;
            let second = (b'A' + ((k / 26) % 26) as u8) as char;
            let third = (b'A' + (k % 26) as u8) as char;
            Some(format!("{}{}{}", first, second, third))
        }
        _ => None,
    }
}

/// Segment number encoded by an extension, case-insensitive
pub fn segment_number(extension: &str) -> Option<u32> {
    let upper = extension.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    if bytes.len() != 3 {
        return None;
    }

    if bytes[0] == b'E' && bytes[1].is_ascii_digit() && bytes[2].is_ascii_digit() {
        let number = upper[1..].parse::<u32>().ok()?;
        return (number > 0).then_some(number);
    }

    if bytes.iter().all(|b| b.is_ascii_uppercase()) && bytes[0] >= b'E' {
        let first = (bytes[0] - b'E') as u32;
        let second = (bytes[1] - b'A') as u32;
        let third = (bytes[2] - b'A') as u32;
        return Some(100 + first * 676 + second * 26 + third);
    }

    None
}

/// Check if a filename carries an EWF segment extension
pub fn is_ewf_segment(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(segment_number)
        .is_some()
}

// =============================================================================
// Discovery
// =============================================================================

/// Discover all segments of an EWF image
///
/// `path` may name any segment (`image.E03`) or the bare base (`image`).
/// Segments are returned in number order starting at `.E01`; discovery stops
/// at the first missing number. Fails if not even the first segment exists.
pub fn discover_e01_segments(path: &Path) -> Result<Vec<PathBuf>, String> {
    debug!(?path, "Discovering E01 segments");
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or("No filename")?
        .to_string_lossy()
        .to_string();

    let base = if is_ewf_segment(&file_name) {
        path.file_stem()
            .ok_or("No filename")?
            .to_string_lossy()
            .to_string()
    } else {
        file_name
    };

    let mut paths = Vec::new();
    for number in 1..=MAX_SEGMENTS {
        let Some(ext) = segment_extension(number) else { break };
        match find_segment(parent, &base, &ext) {
            Some(segment_path) => {
                trace!(segment = number, ?segment_path, "Found E01 segment");
                paths.push(segment_path);
            }
            None => break,
        }
    }

    if paths.is_empty() {
        return Err(format!("no segment matches {}.E01", parent.join(&base).display()));
    }

    debug!(segment_count = paths.len(), "E01 segments discovered");
    Ok(paths)
}

fn find_segment(dir: &Path, base: &str, ext: &str) -> Option<PathBuf> {
    [ext.to_string(), ext.to_lowercase()]
        .iter()
        .map(|candidate| dir.join(format!("{}.{}", base, candidate)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_segment_extension() {
        assert_eq!(segment_extension(0), None);
        assert_eq!(segment_extension(1).unwrap(), "E01");
        assert_eq!(segment_extension(99).unwrap(), "E99");
        assert_eq!(segment_extension(100).unwrap(), "EAA");
        assert_eq!(segment_extension(101).unwrap(), "EAB");
        assert_eq!(segment_extension(126).unwrap(), "EBA");
        assert_eq!(segment_extension(775).unwrap(), "EZZ");
        assert_eq!(segment_extension(776).unwrap(), "FAA");
        assert_eq!(segment_extension(MAX_SEGMENTS).unwrap(), "ZZZ");
        assert_eq!(segment_extension(MAX_SEGMENTS + 1), None);
    }

    #[test]
    fn test_segment_number() {
        assert_eq!(segment_number("E01"), Some(1));
        assert_eq!(segment_number("e42"), Some(42));
        assert_eq!(segment_number("E00"), None);
        assert_eq!(segment_number("EAA"), Some(100));
        assert_eq!(segment_number("faa"), Some(776));
        assert_eq!(segment_number("ZZZ"), Some(MAX_SEGMENTS));
        assert_eq!(segment_number("DAA"), None);
        assert_eq!(segment_number("dmg"), None);
        assert_eq!(segment_number("E1"), None);
    }

    #[test]
    fn test_is_ewf_segment() {
        assert!(is_ewf_segment("image.E01"));
        assert!(is_ewf_segment("image.e02"));
        assert!(!is_ewf_segment("image.dd"));
        assert!(!is_ewf_segment("image.001"));
    }

    #[test]
    fn test_discover_segments() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("disk.E01")).unwrap();
        File::create(dir.path().join("disk.E02")).unwrap();
        File::create(dir.path().join("disk.e03")).unwrap();
        File::create(dir.path().join("disk.E05")).unwrap();

        let from_first = discover_e01_segments(&dir.path().join("disk.E01")).unwrap();
        assert_eq!(from_first.len(), 3);
        assert!(from_first[2].ends_with("disk.e03"));

        let from_base = discover_e01_segments(&dir.path().join("disk")).unwrap();
        assert_eq!(from_base, from_first);

        let from_middle = discover_e01_segments(&dir.path().join("disk.E02")).unwrap();
        assert_eq!(from_middle, from_first);
    }

    #[test]
    fn test_discover_no_segments() {
        let dir = TempDir::new().unwrap();
        assert!(discover_e01_segments(&dir.path().join("missing.E01")).is_err());
    }
}
