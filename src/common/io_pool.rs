// Bounded set of open segment handles
//
// A segmented image may span hundreds of files. Only `capacity` of them are
// kept open at once; the least recently touched one is closed to make room.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::path::PathBuf;

use tracing::{debug, trace};

pub struct SegmentHandles {
    paths: Vec<PathBuf>,
    open: HashMap<usize, File>,
    /// Most recent first
    recency: VecDeque<usize>,
    capacity: usize,
}

impl SegmentHandles {
    pub fn new(paths: Vec<PathBuf>, capacity: usize) -> Self {
        Self {
            paths,
            open: HashMap::new(),
            recency: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn touch(&mut self, segment: usize) {
        self.recency.retain(|&s| s != segment);
        self.recency.push_front(segment);
    }

    /// Handle for `segment`, opened on demand
    pub fn handle(&mut self, segment: usize) -> io::Result<&mut File> {
        let Some(path) = self.paths.get(segment) else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("segment {} out of range ({} segments)", segment, self.paths.len()),
            ));
        };

        if !self.open.contains_key(&segment) {
            if self.open.len() >= self.capacity {
                if let Some(oldest) = self.recency.pop_back() {
                    trace!(oldest, "Closing least recently used segment");
                    self.open.remove(&oldest);
                }
            }
            debug!(segment, path = %path.display(), "Opening segment");
            let file = File::open(path)?;
            self.open.insert(segment, file);
        }
        self.touch(segment);

        self.open
            .get_mut(&segment)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "segment handle missing after open"))
    }

    /// Close every open handle; later calls to `handle` reopen on demand
    pub fn release(&mut self) {
        self.open.clear();
        self.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn segments(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("disk.E{:02}", i + 1));
                std::fs::write(&path, vec![i as u8; 64]).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_capacity_is_respected() {
        let dir = TempDir::new().unwrap();
        let mut handles = SegmentHandles::new(segments(dir.path(), 5), 3);
        assert_eq!(handles.len(), 5);

        for segment in 0..5 {
            handles.handle(segment).unwrap();
            assert!(handles.open_count() <= 3);
        }
        assert_eq!(handles.open_count(), 3);
        assert!(!handles.open.contains_key(&0));
        assert!(handles.open.contains_key(&4));

        handles.release();
        assert_eq!(handles.open_count(), 0);
        handles.handle(0).unwrap();
        assert_eq!(handles.open_count(), 1);
    }

    #[test]
    fn test_recent_use_survives_eviction() {
        let dir = TempDir::new().unwrap();
        let mut handles = SegmentHandles::new(segments(dir.path(), 3), 2);
        handles.handle(0).unwrap();
        handles.handle(1).unwrap();
        handles.handle(0).unwrap();
        handles.handle(2).unwrap();
        assert!(handles.open.contains_key(&0));
        assert!(!handles.open.contains_key(&1));
    }

    #[test]
    fn test_out_of_range() {
        let mut handles = SegmentHandles::new(Vec::new(), 3);
        assert!(handles.is_empty());
        assert_eq!(handles.handle(0).unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
