//! Storage type inference from cast and validation hints.

use serde::{Deserialize, Serialize};

/// Primitive value types understood by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// UTF-8 string.
    String,
    /// Arbitrary-precision number.
    Number,
    /// Boolean.
    Boolean,
    /// Ordered list of values.
    List,
    /// Nested document.
    Map,
    /// Set of strings.
    StringSet,
    /// Opaque bytes.
    Binary,
}

impl StorageType {
    /// Short engine-style type code.
    pub fn code(self) -> &'static str {
        match self {
            StorageType::String => "S",
            StorageType::Number => "N",
            StorageType::Boolean => "BOOL",
            StorageType::List => "L",
            StorageType::Map => "M",
            StorageType::StringSet => "SS",
            StorageType::Binary => "B",
        }
    }
}

/// Infers the storage type of one attribute.
///
/// A cast hint decides on its own, even when it maps to `String`. Without one
/// the validation text is scanned for well-known rule names. Total over all
/// inputs.
pub fn infer_storage_type(cast: Option<&str>, validation: Option<&str>) -> StorageType {
    if let Some(cast) = cast.map(str::trim).filter(|c| !c.is_empty()) {
        return from_cast(cast);
    }
    if let Some(rules) = validation {
        if rules.contains("integer") || rules.contains("numeric") {
            return StorageType::Number;
        }
        if rules.contains("boolean") {
            return StorageType::Boolean;
        }
        if rules.contains("array") {
            return StorageType::List;
        }
    }
    StorageType::String
}

fn from_cast(cast: &str) -> StorageType {
    match cast.to_ascii_lowercase().as_str() {
        "integer" | "int" | "float" | "double" | "decimal" | "number" => StorageType::Number,
        "boolean" | "bool" => StorageType::Boolean,
        "array" | "list" => StorageType::List,
        "object" | "json" | "map" => StorageType::Map,
        "set" => StorageType::StringSet,
        "binary" => StorageType::Binary,
        _ => StorageType::String,
    }
}
