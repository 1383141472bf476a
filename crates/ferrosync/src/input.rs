//! The input table: tag to source-path mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps integer tags to source file paths.
///
/// Populated from `Input:` records; tags are never removed or reused. A
/// redefinition is tolerated (last write wins) and reported by the
/// builder as a diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTable {
    paths: HashMap<i32, String>,
}

impl InputTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous path when `tag` was already defined.
    pub(crate) fn insert(&mut self, tag: i32, path: String) -> Option<String> {
        self.paths.insert(tag, path)
    }

    pub fn get(&self, tag: i32) -> Option<&str> {
        self.paths.get(&tag).map(String::as_str)
    }

    pub fn contains(&self, tag: i32) -> bool {
        self.paths.contains_key(&tag)
    }

    /// Reverse lookup, exact match on the recorded path.
    pub fn tag_for_name(&self, name: &str) -> Option<i32> {
        self.paths
            .iter()
            .find(|(_, path)| path.as_str() == name)
            .map(|(tag, _)| *tag)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.paths.iter().map(|(tag, path)| (*tag, path.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let mut table = InputTable::new();
        assert_eq!(table.insert(1, "main.tex".to_string()), None);
        assert_eq!(
            table.insert(1, "other.tex".to_string()),
            Some("main.tex".to_string())
        );
        assert_eq!(table.get(1), Some("other.tex"));
    }

    #[test]
    fn reverse_lookup_is_exact() {
        let mut table = InputTable::new();
        table.insert(1, "./main.tex".to_string());
        assert_eq!(table.tag_for_name("./main.tex"), Some(1));
        assert_eq!(table.tag_for_name("main.tex"), None);
    }
}
