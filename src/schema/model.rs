//! Canonical, compiled representation of declared entities.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::infer::StorageType;

/// The four supported relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    /// One-to-one, parent side.
    HasOne,
    /// One-to-many, parent side.
    HasMany,
    /// Child side of a one-to-one or one-to-many.
    BelongsTo,
    /// Many-to-many through pivot rows.
    BelongsToMany,
}

impl RelationKind {
    /// Declaration keyword for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::HasOne => "hasOne",
            RelationKind::HasMany => "hasMany",
            RelationKind::BelongsTo => "belongsTo",
            RelationKind::BelongsToMany => "belongsToMany",
        }
    }

    /// Whether this kind needs a secondary index in a single-table design.
    ///
    /// `hasMany` children live in the parent's partition and are found by
    /// sort-key prefix; every other kind needs a reverse lookup.
    pub fn requires_index(self) -> bool {
        !matches!(self, RelationKind::HasMany)
    }

    /// Whether resolution yields a list.
    pub fn is_many(self) -> bool {
        matches!(self, RelationKind::HasMany | RelationKind::BelongsToMany)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute after inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Inferred storage type.
    pub storage_type: StorageType,
    /// Must be present on every row.
    pub required: bool,
    /// May hold null.
    pub nullable: bool,
    /// Unique across the entity; gets a lookup index.
    pub unique: bool,
    /// Injected by a trait flag rather than declared.
    pub synthetic: bool,
    /// Index slot assigned to the unique lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
}

/// Partition/sort key template pair for one secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexKeyTemplate {
    /// Index partition-key template.
    pub partition_key: String,
    /// Index sort-key template.
    pub sort_key: String,
}

/// Key templates of an entity's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPattern {
    /// Table partition-key template.
    pub partition_key: String,
    /// Table sort-key template.
    pub sort_key: String,
    /// Secondary index templates keyed by slot number.
    pub indexes: BTreeMap<u8, IndexKeyTemplate>,
}

/// A relationship after derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Relationship kind.
    pub kind: RelationKind,
    /// Name used to request the relationship at runtime.
    pub name: String,
    /// Related entity name.
    pub related_model: String,
    /// Attribute carrying the reference.
    pub foreign_key: String,
    /// Attribute the reference points at.
    pub local_key: String,
    /// Pivot entity for many-to-many relationships.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<String>,
    /// Whether a secondary index is needed.
    pub requires_index: bool,
    /// Slot assigned by the optimizer.
    #[serde(rename = "gsiIndex", skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    /// False when the related entity is unknown; such relationships are
    /// kept for introspection only.
    pub resolved: bool,
    /// Index key templates this relationship occupies once assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_keys: Option<IndexKeyTemplate>,
}

/// Storage operation behind an access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    /// Point lookup on the full primary key.
    GetItem,
    /// Range query on a partition, optionally narrowed by sort-key prefix.
    Query,
    /// Full table scan.
    Scan,
}

/// What an access pattern is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "relation")]
pub enum PatternKind {
    /// Fetch one entity by primary key.
    PointGet,
    /// List every row of an entity.
    Listing,
    /// Follow a relationship.
    Traversal(RelationKind),
    /// Fetch by a unique attribute.
    UniqueLookup,
}

/// A documented way client code may query the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPattern {
    /// Human-readable name, e.g. `Get Posts by User`.
    pub name: String,
    /// One-sentence description.
    pub description: String,
    /// Entity the pattern belongs to.
    pub entity: String,
    /// Pattern category.
    pub kind: PatternKind,
    /// Storage operation.
    pub operation: Operation,
    /// Relationship or unique attribute the pattern serves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Secondary index slot, when the pattern queries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    /// Key condition expression template.
    pub key_condition: String,
    /// Partition-key template used by the condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    /// Sort-key template or prefix used by the condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    /// Filter expression for scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// False when the pattern needs a full scan.
    pub efficient: bool,
}

/// An entity after compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedModel {
    /// Declared entity name.
    pub name: String,
    /// Upper-cased entity tag.
    pub entity_type: String,
    /// Primary-key attribute.
    pub primary_key: String,
    /// Attributes in declaration order, synthetic ones last.
    pub attributes: Vec<Attribute>,
    /// Relationships in declaration order, grouped by kind.
    pub relationships: Vec<Relationship>,
    /// Row key templates.
    pub key_pattern: KeyPattern,
    /// Supported access patterns.
    pub access_patterns: Vec<AccessPattern>,
}

impl ParsedModel {
    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Looks up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Concrete entity key, e.g. `USER#42`.
    pub fn entity_key(&self, delimiter: &str, id: &str) -> String {
        format!("{}{delimiter}{id}", self.entity_type)
    }

    /// Sort-key prefix shared by all rows of this entity, e.g. `USER#`.
    pub fn key_prefix(&self, delimiter: &str) -> String {
        format!("{}{delimiter}", self.entity_type)
    }
}

/// Builds `{ENTITY}{delimiter}{attr}` with `attr` as a placeholder.
pub(crate) fn key_template(entity_type: &str, delimiter: &str, attr: &str) -> String {
    format!("{entity_type}{delimiter}{{{attr}}}")
}
