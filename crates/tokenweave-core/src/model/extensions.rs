use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Extensions wrapper for extensible key-value storage on a node
///
/// Stores arbitrary vendor data as JSON values, allowing for flexible
/// extension without schema changes. Backed by an ordered map so node
/// serialization stays deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Extensions {
    data: BTreeMap<String, serde_json::Value>,
}

impl Extensions {
    /// Create a new empty Extensions instance
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Set a value by key
    pub fn set(&mut self, key: String, value: serde_json::Value) {
        self.data.insert(key, value);
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Get all keys
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.data.iter()
    }

    /// Get the number of extension entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the extensions map is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<BTreeMap<String, serde_json::Value>> for Extensions {
    fn from(data: BTreeMap<String, serde_json::Value>) -> Self {
        Self { data }
    }
}

impl From<Extensions> for BTreeMap<String, serde_json::Value> {
    fn from(extensions: Extensions) -> Self {
        extensions.data
    }
}
