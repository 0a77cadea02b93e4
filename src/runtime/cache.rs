//! Request-scoped memo of resolved relationships.

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

use crate::runtime::executor::Item;

/// Loaded relationship payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelationData {
    /// Single related row (hasOne, belongsTo).
    One(Item),
    /// Related rows (hasMany, belongsToMany).
    Many(Vec<Item>),
}

impl RelationData {
    /// Number of related rows.
    pub fn len(&self) -> usize {
        match self {
            RelationData::One(_) => 1,
            RelationData::Many(items) => items.len(),
        }
    }

    /// True for an empty collection.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts into the JSON value merged into a parent row.
    pub fn into_value(self) -> Value {
        match self {
            RelationData::One(item) => Value::Object(item),
            RelationData::Many(items) => Value::Array(items.into_iter().map(Value::Object).collect()),
        }
    }
}

/// Cache key: `{entity}:{instanceKey}:{relationship}`.
pub fn cache_key(entity: &str, instance_key: &str, relationship: &str) -> String {
    format!("{entity}:{instance_key}:{relationship}")
}

/// Memo of relationship results for one logical request.
///
/// Owned by the caller and passed by `&mut`; nothing here is shared across
/// requests. Null results are never stored, empty collections are.
#[derive(Debug, Default)]
pub struct RelationshipCache {
    entries: FxHashMap<String, RelationData>,
    hits: usize,
    misses: usize,
}

impl RelationshipCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a result, counting the hit or miss.
    pub fn get(&mut self, key: &str) -> Option<&RelationData> {
        match self.entries.get(key) {
            Some(data) => {
                self.hits += 1;
                Some(data)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// True when `key` is present; does not touch the counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Stores a result.
    pub fn insert(&mut self, key: String, data: RelationData) {
        self.entries.insert(key, data);
    }

    /// Entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Lookups that fell through.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
