//! Compiler and runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Unknown keys are rejected to catch typos early.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hard limit on secondary indexes imposed by the storage engine.
pub const HARD_INDEX_CEILING: usize = 20;

/// Number of secondary indexes that accept attribute-name overrides.
pub const MAX_INDEX_OVERRIDES: usize = 5;

/// How the optimizer compares prefixes before overloading a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationCheck {
    /// Reject the slot when any attached pattern shares the candidate prefix.
    #[default]
    AllPatterns,
    /// Only compare against the slot's first attached pattern.
    FirstPattern,
}

/// Attribute-name override for a single secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexOverride {
    /// Index name; defaults to `GSI{n}`.
    pub name: Option<String>,
    /// Partition-key attribute; defaults to `GSI{n}PK`.
    pub partition_key: Option<String>,
    /// Sort-key attribute; defaults to `GSI{n}SK`.
    pub sort_key: Option<String>,
}

/// Top-level configuration shared by compilation and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Separator between the entity tag and the key value.
    pub key_delimiter: String,
    /// Number of secondary index slots the optimizer may allocate.
    pub max_index_count: usize,
    /// Attribute holding each row's entity type tag.
    pub entity_type_attribute: String,
    /// Per-index attribute-name overrides, in slot order.
    pub indexes: Vec<IndexOverride>,
    /// Lifetime of a cached registry, in seconds.
    pub registry_ttl_secs: u64,
    /// Physical table queried at runtime.
    pub table_name: String,
    /// Table partition-key attribute.
    pub partition_key_attribute: String,
    /// Table sort-key attribute.
    pub sort_key_attribute: String,
    /// Directory scanned for entity declarations.
    pub discovery_path: Option<PathBuf>,
    /// Prefix comparison used when overloading index slots.
    pub consolidation: ConsolidationCheck,
    /// Keep each entity to one pattern per slot, so a row never needs two
    /// key pairs on the same index. Off by default.
    pub exclusive_entity_slots: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_delimiter: "#".to_owned(),
            max_index_count: 5,
            entity_type_attribute: "entityType".to_owned(),
            indexes: Vec::new(),
            registry_ttl_secs: 60,
            table_name: "main".to_owned(),
            partition_key_attribute: "pk".to_owned(),
            sort_key_attribute: "sk".to_owned(),
            discovery_path: None,
            consolidation: ConsolidationCheck::AllPatterns,
            exclusive_entity_slots: false,
        }
    }
}

impl Config {
    /// Configuration that reproduces the legacy first-pattern consolidation rule.
    pub fn legacy() -> Self {
        Self {
            consolidation: ConsolidationCheck::FirstPattern,
            ..Self::default()
        }
    }

    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Config = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Checks value ranges.
    ///
    /// `max_index_count` above [`HARD_INDEX_CEILING`] is deliberately accepted
    /// here; the schema validator reports the resulting design instead.
    pub fn validate(&self) -> Result<()> {
        if self.key_delimiter.is_empty() {
            return Err(Error::invalid_config("keyDelimiter must not be empty"));
        }
        if self.max_index_count == 0 {
            return Err(Error::invalid_config("maxIndexCount must be at least 1"));
        }
        if self.indexes.len() > MAX_INDEX_OVERRIDES {
            return Err(Error::invalid_config(format!(
                "at most {MAX_INDEX_OVERRIDES} index overrides are supported (got {})",
                self.indexes.len()
            )));
        }
        if self.partition_key_attribute.is_empty() || self.sort_key_attribute.is_empty() {
            return Err(Error::invalid_config("table key attributes must not be empty"));
        }
        Ok(())
    }

    /// Registry cache lifetime.
    pub fn registry_ttl(&self) -> Duration {
        Duration::from_secs(self.registry_ttl_secs)
    }

    /// Name of secondary index `number` (1-based).
    pub fn index_name(&self, number: u8) -> String {
        self.index_override(number)
            .and_then(|o| o.name.clone())
            .unwrap_or_else(|| format!("GSI{number}"))
    }

    /// Partition-key attribute of secondary index `number`.
    pub fn index_partition_attribute(&self, number: u8) -> String {
        self.index_override(number)
            .and_then(|o| o.partition_key.clone())
            .unwrap_or_else(|| format!("GSI{number}PK"))
    }

    /// Sort-key attribute of secondary index `number`.
    pub fn index_sort_attribute(&self, number: u8) -> String {
        self.index_override(number)
            .and_then(|o| o.sort_key.clone())
            .unwrap_or_else(|| format!("GSI{number}SK"))
    }

    fn index_override(&self, number: u8) -> Option<&IndexOverride> {
        usize::from(number)
            .checked_sub(1)
            .and_then(|slot| self.indexes.get(slot))
    }
}
