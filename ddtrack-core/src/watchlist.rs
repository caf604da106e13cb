//! The set of player names being tracked.
//!
//! Identity is case-insensitive, but the casing a name was added with is kept
//! and used for display.

use crate::error::{CoreError, Result};
use crate::models::PlayerName;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList {
    names: Vec<PlayerName>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a watch list from stored names. Invalid names and case-insensitive
    /// duplicates are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for name in names {
            let name = name.as_ref();
            if let Err(err) = list.add(name) {
                warn!(player = name, %err, "skipping invalid tracked player name");
            }
        }
        list
    }

    /// Start tracking `name`. Returns `false` if it was already tracked
    /// (under any casing).
    pub fn add(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::EmptyPlayerName);
        }
        let name = PlayerName::try_from(name).map_err(|_| CoreError::PlayerNameTooLong)?;
        if self.contains(&name) {
            return Ok(false);
        }
        self.names.push(name);
        Ok(true)
    }

    /// Stop tracking `name`: exact match first, then a case-insensitive scan.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let idx = self
            .names
            .iter()
            .position(|n| n.as_str() == name)
            .or_else(|| self.names.iter().position(|n| lower_eq(n, name)));
        match idx {
            Some(idx) => {
                self.names.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// The tracked spelling of `name`, matched case-insensitively.
    pub fn find(&self, name: &str) -> Option<&PlayerName> {
        self.names.iter().find(|n| lower_eq(n, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Unicode-aware case-insensitive comparison (names may contain non-ASCII letters).
pub(crate) fn lower_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_original_casing() {
        let mut list = WatchList::new();
        assert!(list.add("Alice").unwrap());
        assert!(!list.add("alice").unwrap());
        assert_eq!(list.len(), 1);
        assert_eq!(list.find("ALICE").unwrap().as_str(), "Alice");
    }

    #[test]
    fn test_add_rejects_long_and_empty_names() {
        let mut list = WatchList::new();
        assert!(matches!(
            list.add(&"x".repeat(65)),
            Err(CoreError::PlayerNameTooLong)
        ));
        assert!(matches!(list.add("   "), Err(CoreError::EmptyPlayerName)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_exact_then_case_insensitive() {
        let mut list = WatchList::from_names(["Alice", "bob"]);
        assert!(list.remove("Alice"));
        assert!(list.remove("BOB"));
        assert!(!list.remove("carol"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_non_ascii_names_match_case_insensitively() {
        let list = WatchList::from_names(["Ёжик"]);
        assert!(list.contains("ёжик"));
    }

    #[test]
    fn test_long_cyrillic_name_is_tracked() {
        let mut list = WatchList::new();
        assert!(list.add("Пельмешка").unwrap());
        // 15 characters of 4-byte UTF-8
        assert!(list.add(&"😀".repeat(15)).unwrap());
        assert!(list.contains("пельмешка"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_from_names_skips_invalid_and_duplicates() {
        let long = "x".repeat(70);
        let list = WatchList::from_names(["nameless tee", "Nameless Tee", "", long.as_str()]);
        assert_eq!(list.len(), 1);
    }
}
