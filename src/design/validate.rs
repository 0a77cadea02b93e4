//! Hard engine limits checked against the compiled index set.

use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;

use crate::design::optimizer::IndexDefinition;

/// A compiled design the storage engine would refuse.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DesignError {
    /// More secondary indexes than the engine allows.
    #[error("design needs {count} secondary indexes but the engine allows {max}")]
    TooManyIndexes {
        /// Indexes in the design.
        count: usize,
        /// Engine ceiling.
        max: usize,
    },
    /// Two indexes share a name.
    #[error("index name '{name}' is used by slots {first} and {second}")]
    DuplicateIndexName {
        /// Shared name.
        name: String,
        /// First slot using it.
        first: u8,
        /// Second slot using it.
        second: u8,
    },
    /// Two indexes project the same key attributes.
    #[error("indexes {first} and {second} both use key pair ({partition_key}, {sort_key})")]
    DuplicateKeyPair {
        /// Shared partition-key attribute.
        partition_key: String,
        /// Shared sort-key attribute.
        sort_key: String,
        /// First slot.
        first: u8,
        /// Second slot.
        second: u8,
    },
}

impl DesignError {
    /// Machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            DesignError::TooManyIndexes { .. } => "TooManyIndexes",
            DesignError::DuplicateIndexName { .. } => "DuplicateIndexName",
            DesignError::DuplicateKeyPair { .. } => "DuplicateKeyPair",
        }
    }
}

/// Serializable outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// True when no error was found.
    pub success: bool,
    /// Every error found.
    pub errors: Vec<DesignError>,
}

impl ValidationReport {
    /// Wraps an error list.
    pub fn from_errors(errors: Vec<DesignError>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }
}

/// Validates a compiled index set.
///
/// Returns every violation; an empty list means the design is valid. The
/// name and key-pair checks are independent: two differently named indexes
/// over the same attributes are still ambiguous to the engine.
pub fn validate_indexes(indexes: &[IndexDefinition], ceiling: usize) -> Vec<DesignError> {
    let mut errors = Vec::new();
    if indexes.len() > ceiling {
        errors.push(DesignError::TooManyIndexes {
            count: indexes.len(),
            max: ceiling,
        });
    }

    let mut names: FxHashMap<&str, u8> = FxHashMap::default();
    let mut pairs: FxHashMap<(&str, &str), u8> = FxHashMap::default();
    for def in indexes {
        if let Some(&first) = names.get(def.name.as_str()) {
            errors.push(DesignError::DuplicateIndexName {
                name: def.name.clone(),
                first,
                second: def.number,
            });
        } else {
            names.insert(&def.name, def.number);
        }

        let pair = (def.partition_key.as_str(), def.sort_key.as_str());
        if let Some(&first) = pairs.get(&pair) {
            errors.push(DesignError::DuplicateKeyPair {
                partition_key: def.partition_key.clone(),
                sort_key: def.sort_key.clone(),
                first,
                second: def.number,
            });
        } else {
            pairs.insert(pair, def.number);
        }
    }
    errors
}
