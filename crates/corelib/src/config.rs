//! Ordered string key/value configuration attached to every importer.
//!
//! An importer's default configuration doubles as the set of keys it
//! recognizes: anything not present there is treated as unknown.

use crate::{CoreError, CoreResult};

/// Insertion-ordered key/value store. Keys are unique.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    entries: Vec<(String, String)>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs; later duplicates overwrite earlier ones.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut config = Self::new();
        for (k, v) in pairs {
            config.set_value(k, v);
        }
        config
    }

    /// Parse a `key=val,key2=val2` list as accepted on the command line.
    /// Empty segments are skipped.
    pub fn parse_pairs(list: &str) -> CoreResult<Self> {
        let mut config = Self::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| CoreError::MalformedOption(item.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CoreError::EmptyOptionKey(item.to_string()));
            }
            config.set_value(key, value.trim());
        }
        Ok(config)
    }

    /// Set a value, keeping the original position if the key already exists.
    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn has_value(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
