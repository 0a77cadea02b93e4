//! Entity declarations as supplied by the caller's configuration source.

use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One entity as declared by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntityDeclaration {
    /// Entity name, e.g. `User`.
    pub name: String,
    /// Primary-key attribute name.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Declared attributes in declaration order.
    #[serde(default)]
    pub attributes: Vec<AttributeDeclaration>,
    /// Relationship stubs grouped by kind.
    #[serde(default)]
    pub relationships: RelationshipGroups,
    /// Behavioural trait flags.
    #[serde(default)]
    pub traits: TraitFlags,
}

fn default_primary_key() -> String {
    "id".to_owned()
}

/// A declared attribute with its hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AttributeDeclaration {
    /// Attribute name.
    pub name: String,
    /// Whether the attribute must be present.
    pub required: bool,
    /// Whether the attribute may hold null.
    pub nullable: bool,
    /// Whether the attribute value is unique across the entity.
    pub unique: bool,
    /// Cast hint, e.g. `integer` or `json`.
    pub cast: Option<String>,
    /// Free-form validation rule text, e.g. `required|integer|min:0`.
    pub validation: Option<String>,
    /// Default value.
    pub default: Option<Value>,
}

/// Relationship stubs grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationshipGroups {
    /// One-to-one, parent side.
    pub has_one: Vec<RelationshipStub>,
    /// One-to-many, parent side.
    pub has_many: Vec<RelationshipStub>,
    /// Child side of a one-to-one or one-to-many.
    pub belongs_to: Vec<RelationshipStub>,
    /// Many-to-many through a pivot entity.
    pub belongs_to_many: Vec<RelationshipStub>,
}

impl RelationshipGroups {
    /// Returns true when no stub is declared.
    pub fn is_empty(&self) -> bool {
        self.has_one.is_empty()
            && self.has_many.is_empty()
            && self.belongs_to.is_empty()
            && self.belongs_to_many.is_empty()
    }
}

/// A relationship stub: either a bare entity name or a detailed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipStub {
    /// `"User"`
    Model(String),
    /// `{ model = "User", foreignKey = "authorId" }`
    Detailed(RelationshipOptions),
}

/// Detailed relationship stub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationshipOptions {
    /// Related entity name.
    pub model: String,
    /// Relationship name used at resolution time.
    #[serde(default)]
    pub name: Option<String>,
    /// Foreign-key attribute override.
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Local-key attribute override.
    #[serde(default)]
    pub local_key: Option<String>,
    /// Pivot entity override (many-to-many only).
    #[serde(default)]
    pub pivot: Option<String>,
}

impl RelationshipStub {
    /// Normalises the stub into its detailed form.
    pub fn options(&self) -> RelationshipOptions {
        match self {
            RelationshipStub::Model(model) => RelationshipOptions {
                model: model.clone(),
                ..RelationshipOptions::default()
            },
            RelationshipStub::Detailed(opts) => opts.clone(),
        }
    }
}

/// Behavioural trait flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TraitFlags {
    /// Maintain `createdAt` / `updatedAt`.
    pub timestamps: bool,
    /// Mark rows deleted through `deletedAt` instead of removing them.
    pub soft_delete: bool,
    /// The primary key is generated on insert.
    pub generated_id: bool,
    /// Rows expire through a `ttl` attribute.
    pub time_to_live: bool,
    /// Writes are guarded by a `version` counter.
    pub versioning: bool,
}

impl EntityDeclaration {
    /// Starts a declaration with the default `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            attributes: Vec::new(),
            relationships: RelationshipGroups::default(),
            traits: TraitFlags::default(),
        }
    }

    /// Overrides the primary-key attribute.
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    /// Appends an attribute.
    pub fn attribute(mut self, attribute: AttributeDeclaration) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Appends a `hasOne` stub.
    pub fn has_one(mut self, stub: impl Into<RelationshipStub>) -> Self {
        self.relationships.has_one.push(stub.into());
        self
    }

    /// Appends a `hasMany` stub.
    pub fn has_many(mut self, stub: impl Into<RelationshipStub>) -> Self {
        self.relationships.has_many.push(stub.into());
        self
    }

    /// Appends a `belongsTo` stub.
    pub fn belongs_to(mut self, stub: impl Into<RelationshipStub>) -> Self {
        self.relationships.belongs_to.push(stub.into());
        self
    }

    /// Appends a `belongsToMany` stub.
    pub fn belongs_to_many(mut self, stub: impl Into<RelationshipStub>) -> Self {
        self.relationships.belongs_to_many.push(stub.into());
        self
    }

    /// Replaces the trait flags.
    pub fn traits(mut self, traits: TraitFlags) -> Self {
        self.traits = traits;
        self
    }

    /// Decodes a declaration from JSON text.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let decl: EntityDeclaration = serde_json::from_str(input)?;
        decl.check()?;
        Ok(decl)
    }

    /// Decodes a declaration from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let decl: EntityDeclaration = toml::from_str(input)?;
        decl.check()?;
        Ok(decl)
    }

    /// Decodes a declaration file, picking the format from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            Some("toml") => Self::from_toml_str(&raw),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Structural checks that serde cannot express.
    pub fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_declaration("entity name must not be empty"));
        }
        if self.primary_key.trim().is_empty() {
            return Err(Error::invalid_declaration(format!(
                "{}: primary key must not be empty",
                self.name
            )));
        }
        let mut seen = FxHashSet::default();
        for attr in &self.attributes {
            if attr.name.trim().is_empty() {
                return Err(Error::invalid_declaration(format!(
                    "{}: attribute name must not be empty",
                    self.name
                )));
            }
            if !seen.insert(attr.name.as_str()) {
                return Err(Error::invalid_declaration(format!(
                    "{}: attribute '{}' declared twice",
                    self.name, attr.name
                )));
            }
        }
        let groups = &self.relationships;
        for stub in groups
            .has_one
            .iter()
            .chain(&groups.has_many)
            .chain(&groups.belongs_to)
            .chain(&groups.belongs_to_many)
        {
            if stub.options().model.trim().is_empty() {
                return Err(Error::invalid_declaration(format!(
                    "{}: relationship target must not be empty",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl AttributeDeclaration {
    /// Plain attribute without hints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the cast hint.
    pub fn cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }

    /// Sets the validation hint.
    pub fn validation(mut self, rule: impl Into<String>) -> Self {
        self.validation = Some(rule.into());
        self
    }

    /// Marks the attribute required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the attribute nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the attribute unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl From<&str> for RelationshipStub {
    fn from(model: &str) -> Self {
        RelationshipStub::Model(model.to_owned())
    }
}

impl From<String> for RelationshipStub {
    fn from(model: String) -> Self {
        RelationshipStub::Model(model)
    }
}

impl From<RelationshipOptions> for RelationshipStub {
    fn from(opts: RelationshipOptions) -> Self {
        RelationshipStub::Detailed(opts)
    }
}
