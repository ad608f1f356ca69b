//! LRU Chunk Cache for the EWF handle (like libfcache)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Decompressed chunks with LRU eviction
/// Uses Arc so a hit hands out the buffer without copying it
pub(crate) struct ChunkCache {
    cache: HashMap<usize, Arc<Vec<u8>>>,
    lru_queue: VecDeque<usize>,
    max_entries: usize,
}

impl ChunkCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: HashMap::new(),
            lru_queue: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&mut self, chunk_index: usize) -> Option<Arc<Vec<u8>>> {
        let data = self.cache.get(&chunk_index)?;
        self.lru_queue.retain(|&x| x != chunk_index);
        self.lru_queue.push_front(chunk_index);
        Some(Arc::clone(data))
    }

    pub fn insert(&mut self, chunk_index: usize, data: Vec<u8>) -> Arc<Vec<u8>> {
        if self.cache.len() >= self.max_entries && !self.cache.contains_key(&chunk_index) {
            if let Some(old_index) = self.lru_queue.pop_back() {
                self.cache.remove(&old_index);
            }
        }

        let data = Arc::new(data);
        self.cache.insert(chunk_index, Arc::clone(&data));
        self.lru_queue.retain(|&x| x != chunk_index);
        self.lru_queue.push_front(chunk_index);
        data
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.lru_queue.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_eviction() {
        let mut cache = ChunkCache::new(2);
        cache.insert(0, vec![0]);
        cache.insert(1, vec![1]);
        assert!(cache.get(0).is_some());

        // 1 is now least recently used
        cache.insert(2, vec![2]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(1).is_none());
        assert_eq!(*cache.get(0).unwrap(), vec![0]);
        assert_eq!(*cache.get(2).unwrap(), vec![2]);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
