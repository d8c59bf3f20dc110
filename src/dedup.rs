use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Simple pluggable store tracking image URLs already admitted to the queue.
pub trait DedupStore: Send + Sync {
    /// Returns true if the URL was newly recorded. Returns false when a
    /// duplicate is detected.
    fn record(&self, image_url: &str) -> bool;
}

/// In-memory implementation used by default and in tests. Lives as long as
/// the owning pipeline; a restart forgets everything it has seen.
#[derive(Debug, Default)]
pub struct InMemoryDedupStore {
    seen: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupStore for InMemoryDedupStore {
    fn record(&self, image_url: &str) -> bool {
        let mut guard = self.seen.lock().expect("poisoned dedup store");
        guard.insert(image_url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_url_once() {
        let store = InMemoryDedupStore::new();
        assert!(store.record("https://cdn.example.com/a.jpg"));
        assert!(!store.record("https://cdn.example.com/a.jpg"));
        assert!(store.record("https://cdn.example.com/b.jpg"));
    }
}
