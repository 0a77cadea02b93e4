//! In-process executor over plain JSON rows.
//!
//! Used by tests and local tooling. Key conditions are evaluated against the
//! attributes they name, so secondary-index queries work on any row that
//! carries the index key attributes. Filter expressions are not interpreted.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::runtime::executor::{Item, ItemKey, QueryExecutor, RangeQuery, SortCondition};

/// Failure raised by [`MemoryExecutor`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The requested table was never written to.
    #[error("table '{0}' does not exist")]
    UnknownTable(String),
    /// A failure queued with [`MemoryExecutor::fail_next`].
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Per-operation call counters.
#[derive(Debug, Default)]
struct CallCounts {
    point_get: AtomicUsize,
    range_query: AtomicUsize,
    batch_get: AtomicUsize,
}

/// Snapshot of how often each operation ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Point gets issued.
    pub point_get: usize,
    /// Range queries issued.
    pub range_query: usize,
    /// Batch gets issued.
    pub batch_get: usize,
}

impl CallStats {
    /// Total round trips.
    pub fn total(&self) -> usize {
        self.point_get + self.range_query + self.batch_get
    }
}

/// Thread-safe in-memory table store.
#[derive(Debug)]
pub struct MemoryExecutor {
    partition_attribute: String,
    sort_attribute: String,
    tables: RwLock<FxHashMap<String, Vec<Item>>>,
    calls: CallCounts,
    pending_failure: Mutex<Option<String>>,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new("pk", "sk")
    }
}

impl MemoryExecutor {
    /// Creates an empty store using the given table key attributes.
    pub fn new(partition_attribute: impl Into<String>, sort_attribute: impl Into<String>) -> Self {
        Self {
            partition_attribute: partition_attribute.into(),
            sort_attribute: sort_attribute.into(),
            tables: RwLock::new(FxHashMap::default()),
            calls: CallCounts::default(),
            pending_failure: Mutex::new(None),
        }
    }

    /// Inserts or replaces a row, keyed by its table key attributes.
    pub fn put(&self, table: &str, item: Item) {
        let key = self.key_of(&item);
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_owned()).or_default();
        if let Some(existing) = rows.iter_mut().find(|row| key.is_some() && self.key_of(row) == key) {
            *existing = item;
        } else {
            rows.push(item);
        }
    }

    /// Inserts many rows.
    pub fn put_all(&self, table: &str, items: impl IntoIterator<Item = Item>) {
        for item in items {
            self.put(table, item);
        }
    }

    /// Number of rows stored in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    /// True when `table` holds no rows.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Makes the next operation fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.pending_failure.lock() = Some(message.into());
    }

    /// Current call counters.
    pub fn stats(&self) -> CallStats {
        CallStats {
            point_get: self.calls.point_get.load(Ordering::Relaxed),
            range_query: self.calls.range_query.load(Ordering::Relaxed),
            batch_get: self.calls.batch_get.load(Ordering::Relaxed),
        }
    }

    /// Zeroes the call counters.
    pub fn reset_stats(&self) {
        self.calls.point_get.store(0, Ordering::Relaxed);
        self.calls.range_query.store(0, Ordering::Relaxed);
        self.calls.batch_get.store(0, Ordering::Relaxed);
    }

    fn key_of(&self, item: &Item) -> Option<ItemKey> {
        Some(ItemKey {
            partition_key: string_attr(item, &self.partition_attribute)?.to_owned(),
            sort_key: string_attr(item, &self.sort_attribute)?.to_owned(),
        })
    }

    fn take_failure(&self) -> Result<(), MemoryError> {
        match self.pending_failure.lock().take() {
            Some(message) => Err(MemoryError::Injected(message)),
            None => Ok(()),
        }
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&[Item]) -> T) -> Result<T, MemoryError> {
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| MemoryError::UnknownTable(table.to_owned()))?;
        Ok(f(rows))
    }
}

fn string_attr<'a>(item: &'a Item, attr: &str) -> Option<&'a str> {
    item.get(attr).and_then(Value::as_str)
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    type Error = MemoryError;

    async fn point_get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, Self::Error> {
        self.calls.point_get.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        trace!(table, pk = %key.partition_key, sk = %key.sort_key, "memory point get");
        self.with_table(table, |rows| {
            rows.iter()
                .find(|row| self.key_of(row).as_ref() == Some(key))
                .cloned()
        })
    }

    async fn range_query(&self, table: &str, query: &RangeQuery) -> Result<Vec<Item>, Self::Error> {
        self.calls.range_query.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        trace!(table, query = %query, "memory range query");
        let key = &query.key;
        let sort_attribute = key
            .sort
            .as_ref()
            .map_or(self.sort_attribute.as_str(), |(attr, _)| attr.as_str());
        self.with_table(table, |rows| {
            let mut matched: Vec<Item> = rows
                .iter()
                .filter(|row| string_attr(row, &key.partition_attribute) == Some(key.partition_value.as_str()))
                .filter(|row| match &key.sort {
                    None => true,
                    Some((attr, condition)) => match (string_attr(row, attr), condition) {
                        (Some(value), SortCondition::Equals(expected)) => value == expected,
                        (Some(value), SortCondition::BeginsWith(prefix)) => value.starts_with(prefix.as_str()),
                        (None, _) => false,
                    },
                })
                .cloned()
                .collect();
            matched.sort_by(|a, b| string_attr(a, sort_attribute).cmp(&string_attr(b, sort_attribute)));
            if !query.scan_forward {
                matched.reverse();
            }
            if let Some(limit) = query.limit {
                matched.truncate(limit);
            }
            matched
        })
    }

    async fn batch_get(&self, table: &str, keys: &[ItemKey]) -> Result<Vec<Item>, Self::Error> {
        self.calls.batch_get.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        trace!(table, keys = keys.len(), "memory batch get");
        self.with_table(table, |rows| {
            keys.iter()
                .filter_map(|key| rows.iter().find(|row| self.key_of(row).as_ref() == Some(key)))
                .cloned()
                .collect()
        })
    }
}
