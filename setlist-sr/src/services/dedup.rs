//! Dedup index
//!
//! A set of normalized `title|artist` keys guarding against processing or
//! emitting the same logical song twice within a session. Keys are recorded
//! only when an item is accepted into the playlist (or seeded from caller
//! exclusions), never for candidates that merely failed to resolve, so a
//! song that was unavailable under one spelling can still match later under
//! another.

use std::collections::HashSet;

use setlist_common::dedup_key;

/// Session-scoped set of accepted song identities
#[derive(Debug, Default)]
pub struct DedupIndex {
    keys: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this key was already recorded
    pub fn seen(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Record a key; returns false when it was already present
    pub fn record(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    /// Seed the index from `(title, artist)` pairs ahead of processing
    pub fn seed<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (title, artist) in pairs {
            self.keys.insert(dedup_key(title, artist));
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_then_seen() {
        let mut index = DedupIndex::new();
        let key = dedup_key("Phaedra", "Tangerine Dream");
        assert!(!index.seen(&key));
        assert!(index.record(key.clone()));
        assert!(index.seen(&key));
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut index = DedupIndex::new();
        let key = dedup_key("Phaedra", "Tangerine Dream");
        assert!(index.record(key.clone()));
        assert!(!index.record(key));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_seed_normalizes_case_and_whitespace() {
        let mut index = DedupIndex::new();
        index.seed([("  PHAEDRA ", "Tangerine Dream")]);
        assert!(index.seen(&dedup_key("phaedra", "tangerine dream")));
    }

    #[test]
    fn test_same_title_different_artist_is_distinct() {
        let mut index = DedupIndex::new();
        index.record(dedup_key("Hurt", "Nine Inch Nails"));
        assert!(!index.seen(&dedup_key("Hurt", "Johnny Cash")));
    }
}
