//! Contract with the externally supplied query executor.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// A stored row as seen through the executor.
pub type Item = Map<String, Value>;

/// Full primary key of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKey {
    /// Partition-key value.
    pub partition_key: String,
    /// Sort-key value.
    pub sort_key: String,
}

impl ItemKey {
    /// Key whose partition and sort values are equal, as entity rows use.
    pub fn entity(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            partition_key: key.clone(),
            sort_key: key,
        }
    }
}

/// Condition on the sort key of a range query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "op", content = "value")]
pub enum SortCondition {
    /// Exact match.
    Equals(String),
    /// Prefix match.
    BeginsWith(String),
}

/// Key condition of a range query, kept structured so executors need not
/// parse the rendered expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCondition {
    /// Partition-key attribute (table or index).
    pub partition_attribute: String,
    /// Partition-key value.
    pub partition_value: String,
    /// Sort-key attribute and condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<(String, SortCondition)>,
}

impl KeyCondition {
    /// Partition equality only.
    pub fn partition(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            partition_attribute: attribute.into(),
            partition_value: value.into(),
            sort: None,
        }
    }

    /// Adds a sort-key prefix condition.
    pub fn begins_with(mut self, attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.sort = Some((attribute.into(), SortCondition::BeginsWith(prefix.into())));
        self
    }

    /// Renders the expression, e.g. `pk = :pk AND begins_with(sk, :sk)`.
    pub fn expression(&self) -> String {
        let head = format!("{} = :pk", self.partition_attribute);
        match &self.sort {
            None => head,
            Some((attr, SortCondition::Equals(_))) => format!("{head} AND {attr} = :sk"),
            Some((attr, SortCondition::BeginsWith(_))) => {
                format!("{head} AND begins_with({attr}, :sk)")
            }
        }
    }

    /// Placeholder values referenced by [`KeyCondition::expression`].
    pub fn values(&self) -> Map<String, Value> {
        let mut values = Map::new();
        values.insert(":pk".to_owned(), Value::String(self.partition_value.clone()));
        if let Some((_, SortCondition::Equals(v) | SortCondition::BeginsWith(v))) = &self.sort {
            values.insert(":sk".to_owned(), Value::String(v.clone()));
        }
        values
    }
}

/// A range query description handed to the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    /// Secondary index to query, or the table itself when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Key condition.
    pub key: KeyCondition,
    /// Maximum rows to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Optional filter expression applied after the key condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Values referenced by the filter expression.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub filter_values: Map<String, Value>,
    /// Ascending sort-key order when true.
    pub scan_forward: bool,
}

impl RangeQuery {
    /// Query on the table's primary key.
    pub fn new(key: KeyCondition) -> Self {
        Self {
            index_name: None,
            key,
            limit: None,
            filter_expression: None,
            filter_values: Map::new(),
            scan_forward: true,
        }
    }

    /// Targets a secondary index.
    pub fn on_index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rendered key condition expression.
    pub fn key_condition(&self) -> String {
        self.key.expression()
    }

    /// Values for the key condition placeholders.
    pub fn key_values(&self) -> Map<String, Value> {
        self.key.values()
    }
}

impl fmt::Display for RangeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = &self.index_name {
            write!(f, "[{index}] ")?;
        }
        write!(f, "{}", self.key_condition())?;
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

/// Storage operations the resolver depends on.
///
/// Errors are the executor's own and reach the resolver's caller unchanged.
/// Timeouts, retries and concurrency caps belong to implementations.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Error type surfaced to resolver callers.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches one row by full key.
    async fn point_get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, Self::Error>;

    /// Runs a key-condition query on the table or one of its indexes.
    async fn range_query(&self, table: &str, query: &RangeQuery) -> Result<Vec<Item>, Self::Error>;

    /// Fetches many rows by full key; missing rows are omitted.
    async fn batch_get(&self, table: &str, keys: &[ItemKey]) -> Result<Vec<Item>, Self::Error>;
}
