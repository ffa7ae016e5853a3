//! Bounded memo of tokenization results with LRU eviction.
use linked_hash_map::LinkedHashMap;
use tracing::debug;

/// Distinct inputs remembered per embedder instance.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Maps an exact input string to the tokens produced for it.
///
/// Front of the map is the least recently used entry.
pub struct TokenCache {
    entries: LinkedHashMap<String, Vec<String>>,
    capacity: usize,
}

impl TokenCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: LinkedHashMap::new(), capacity }
    }

    /// Cached tokens for `text`, marking the entry as most recently used.
    pub fn get(&mut self, text: &str) -> Option<&Vec<String>> {
        self.entries.get_refresh(text).map(|tokens| &*tokens)
    }

    /// Remember `tokens` for `text`, evicting the least recently used entry when full.
    /// Returns the evicted input, if any.
    pub fn insert(&mut self, text: String, tokens: Vec<String>) -> Option<String> {
        if self.capacity == 0 { return None; }
        let mut evicted = None;
        if !self.entries.contains_key(&text) && self.entries.len() >= self.capacity {
            if let Some((old, _)) = self.entries.pop_front() {
                debug!(capacity = self.capacity, "token cache full; evicted oldest entry");
                evicted = Some(old);
            }
        }
        self.entries.insert(text, tokens);
        evicted
    }

    /// Whether `text` is cached, without touching recency.
    pub fn contains(&self, text: &str) -> bool { self.entries.contains_key(text) }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn capacity(&self) -> usize { self.capacity }
}

impl Default for TokenCache {
    fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> { s.split_whitespace().map(str::to_string).collect() }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = TokenCache::new(2);
        cache.insert("a".into(), toks("a"));
        cache.insert("b".into(), toks("b"));
        // Touch "a" so "b" becomes the oldest.
        assert!(cache.get("a").is_some());
        let evicted = cache.insert("c".into(), toks("c"));
        assert_eq!(evicted.as_deref(), Some("b"));
        assert!(cache.contains("a") && cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinserting_existing_key_does_not_evict() {
        let mut cache = TokenCache::new(1);
        cache.insert("a".into(), toks("a"));
        assert!(cache.insert("a".into(), toks("a a")).is_none());
        assert_eq!(cache.get("a").unwrap().len(), 2);
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let mut cache = TokenCache::new(0);
        cache.insert("a".into(), toks("a"));
        assert!(cache.is_empty());
    }
}
