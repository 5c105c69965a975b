use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Thread-safe LRU cache of query embeddings.
///
/// Entries are keyed by model and text so that switching the embedding model
/// never serves a vector of the wrong shape.
pub struct EmbeddingCache {
    cache: Mutex<LruCache<(String, String), Vec<f32>>>,
}

impl EmbeddingCache {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<(String, String), Vec<f32>>> {
        // a panic mid-insert leaves the LRU consistent, so a poisoned lock is still usable
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, model: &str, text: &str) -> Option<Vec<f32>> {
        self.lock().get(&(model.to_string(), text.to_string())).cloned()
    }

    pub fn put(&self, model: &str, text: &str, embedding: Vec<f32>) {
        self.lock().put((model.to_string(), text.to_string()), embedding);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[cfg(test)]
    fn clear(&self) {
        self.lock().clear();
    }
}
