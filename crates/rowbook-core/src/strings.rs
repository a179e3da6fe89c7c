//! Shared string pool
//!
//! Cells never carry text inline; they reference entries in the workbook's
//! shared string table by index. The pool de-duplicates on insert and keeps
//! insertion order, since the index *is* the serialized identity.

use std::collections::{BTreeMap, HashMap};

use crate::MAX_TEXT_LEN;

/// De-duplicated, append-only table of shared strings
#[derive(Debug, Default)]
pub struct SharedStrings {
    by_index: BTreeMap<u32, String>,
    by_text: HashMap<String, u32>,
}

impl SharedStrings {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pooled strings
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Get a pooled string by index
    pub fn get(&self, index: u32) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    /// Get the index of a pooled string, if present
    pub fn index_of(&self, text: &str) -> Option<u32> {
        self.by_text.get(text).copied()
    }

    /// Register `text` at the requested index, or at the next free index.
    ///
    /// When re-importing a parsed package, entries may arrive with explicit
    /// indices; an occupied index is never overwritten — registration probes
    /// forward to the next free slot instead.
    pub fn add(&mut self, text: &str, index: Option<u32>) -> u32 {
        let mut index = index.unwrap_or(self.by_index.len() as u32);
        while self.by_index.contains_key(&index) {
            index += 1;
        }
        self.by_index.insert(index, text.to_string());
        self.by_text.insert(text.to_string(), index);
        index
    }

    /// Intern `text`, returning its pool index.
    ///
    /// The text is truncated to [`MAX_TEXT_LEN`] characters first (the XML
    /// text-node limit for this format). Interning the same text twice
    /// returns the same index.
    pub fn find(&mut self, text: &str) -> u32 {
        let text = truncate(text);
        match self.by_text.get(text) {
            Some(&index) => index,
            None => self.add(text, None),
        }
    }

    /// Iterate over `(index, text)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.by_index.iter().map(|(&i, s)| (i, s.as_str()))
    }
}

/// Truncate to at most [`MAX_TEXT_LEN`] characters, on a char boundary.
fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_LEN) {
        Some((byte_pos, _)) => &text[..byte_pos],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut pool = SharedStrings::new();
        let a = pool.find("Alice");
        assert_eq!(pool.find("Alice"), a);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_distinct_texts_get_increasing_indices() {
        let mut pool = SharedStrings::new();
        let a = pool.find("Alice");
        let b = pool.find("Bob");
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(pool.get(a), Some("Alice"));
        assert_eq!(pool.get(b), Some("Bob"));
    }

    #[test]
    fn test_explicit_index_probes_forward() {
        let mut pool = SharedStrings::new();
        pool.add("zero", Some(0));
        pool.add("one", Some(1));
        // Index 0 is taken; registration must not overwrite it
        let idx = pool.add("again", Some(0));
        assert_eq!(idx, 2);
        assert_eq!(pool.get(0), Some("zero"));
        assert_eq!(pool.get(2), Some("again"));
    }

    #[test]
    fn test_find_truncates_long_text() {
        let mut pool = SharedStrings::new();
        let long = "x".repeat(40_000);
        let idx = pool.find(&long);
        assert!(pool.get(idx).unwrap().chars().count() <= MAX_TEXT_LEN);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long: String = "é".repeat(MAX_TEXT_LEN + 10);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), MAX_TEXT_LEN);
    }

    #[test]
    fn test_iter_in_index_order() {
        let mut pool = SharedStrings::new();
        pool.find("b");
        pool.find("a");
        pool.find("c");
        let texts: Vec<_> = pool.iter().map(|(_, s)| s).collect();
        assert_eq!(texts, ["b", "a", "c"]);
    }
}
