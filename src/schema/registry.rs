//! The compiled registry and the builder that assembles its skeleton.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, HARD_INDEX_CEILING};
use crate::design::optimizer::{IndexDefinition, IndexUsage};
use crate::design::validate::{validate_indexes, ValidationReport};
use crate::schema::declaration::{AttributeDeclaration, EntityDeclaration};
use crate::schema::derive::{derive_relationships, link_relationships};
use crate::schema::infer::{infer_storage_type, StorageType};
use crate::schema::model::{key_template, AccessPattern, Attribute, KeyPattern, ParsedModel};
use crate::schema::source::DeclarationSource;
use crate::schema::warning::{Warning, WarningKind};

/// Physical table facts the resolver needs at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLayout {
    /// Table name passed to the executor.
    pub table_name: String,
    /// Table partition-key attribute.
    pub partition_key_attribute: String,
    /// Table sort-key attribute.
    pub sort_key_attribute: String,
    /// Separator between entity tag and key value.
    pub key_delimiter: String,
    /// Attribute holding the entity tag.
    pub entity_type_attribute: String,
}

impl From<&Config> for TableLayout {
    fn from(config: &Config) -> Self {
        Self {
            table_name: config.table_name.clone(),
            partition_key_attribute: config.partition_key_attribute.clone(),
            sort_key_attribute: config.sort_key_attribute.clone(),
            key_delimiter: config.key_delimiter.clone(),
            entity_type_attribute: config.entity_type_attribute.clone(),
        }
    }
}

/// Compiled single-table design.
///
/// Plain data: once compiled it is only read, and may be shared behind an
/// `Arc` across concurrent resolutions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// Parsed models in declaration order.
    pub models: Vec<ParsedModel>,
    /// Every access pattern, grouped by model in declaration order.
    pub access_patterns: Vec<AccessPattern>,
    /// `Entity:related` or `Entity:unique:attr` to index slot.
    pub index_assignments: BTreeMap<String, u8>,
    /// Per-slot usage summary.
    pub index_usage: Vec<IndexUsage>,
    /// Secondary indexes the design needs.
    pub indexes: Vec<IndexDefinition>,
    /// Non-fatal findings.
    pub warnings: Vec<Warning>,
    /// Table layout used at runtime.
    pub layout: TableLayout,
    /// Hash of the index assignment table.
    pub fingerprint: u64,
    #[serde(skip)]
    by_name: FxHashMap<String, usize>,
}

impl Registry {
    /// Registry without models.
    pub fn empty(layout: TableLayout) -> Self {
        Self {
            models: Vec::new(),
            access_patterns: Vec::new(),
            index_assignments: BTreeMap::new(),
            index_usage: Vec::new(),
            indexes: Vec::new(),
            warnings: Vec::new(),
            layout,
            fingerprint: 0,
            by_name: FxHashMap::default(),
        }
    }

    /// Looks up a model by declared name.
    pub fn model(&self, name: &str) -> Option<&ParsedModel> {
        self.model_index(name).and_then(|idx| self.models.get(idx))
    }

    /// Position of `name` in `models`, if the lookup table still agrees with it.
    pub(crate) fn model_index(&self, name: &str) -> Option<usize> {
        self.by_name
            .get(name)
            .copied()
            .filter(|&idx| self.models.get(idx).is_some_and(|m| m.name == name))
    }

    /// Returns true when no model compiled.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Slot assigned to a relationship lookup.
    pub fn index_for(&self, entity: &str, related: &str) -> Option<u8> {
        self.index_assignments
            .get(&relation_assignment_key(entity, related))
            .copied()
    }

    /// Slot assigned to a unique-attribute lookup.
    pub fn unique_index_for(&self, entity: &str, attribute: &str) -> Option<u8> {
        self.index_assignments
            .get(&unique_assignment_key(entity, attribute))
            .copied()
    }

    /// Definition of slot `number`.
    pub fn index(&self, number: u8) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|def| def.number == number)
    }

    /// Access patterns of one entity.
    pub fn patterns_for<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a AccessPattern> + 'a {
        self.access_patterns.iter().filter(move |p| p.entity == entity)
    }

    /// Runs the schema validator over the compiled index set.
    pub fn validate(&self) -> ValidationReport {
        ValidationReport::from_errors(validate_indexes(&self.indexes, HARD_INDEX_CEILING))
    }

    pub(crate) fn push_warning(&mut self, warning: Warning) {
        warn!(kind = ?warning.kind, subject = %warning.subject, "{}", warning.message);
        self.warnings.push(warning);
    }

    fn push_model(&mut self, model: ParsedModel) {
        self.by_name.insert(model.name.clone(), self.models.len());
        self.models.push(model);
    }
}

/// Assignment-table key for a relationship lookup.
pub fn relation_assignment_key(entity: &str, related: &str) -> String {
    format!("{entity}:{related}")
}

/// Assignment-table key for a unique-attribute lookup.
pub fn unique_assignment_key(entity: &str, attribute: &str) -> String {
    format!("{entity}:unique:{attribute}")
}

/// Turns declarations into parsed models.
///
/// The result has no index assignments and no access patterns; see
/// [`crate::design::compile`] for the full pipeline.
pub struct RegistryBuilder<'a> {
    config: &'a Config,
}

impl<'a> RegistryBuilder<'a> {
    /// Creates a builder bound to a configuration.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Builds the registry skeleton.
    ///
    /// Never fails: an unreadable source produces an empty registry with one
    /// warning, bad declarations are skipped with a warning each.
    pub fn build(&self, source: &DeclarationSource) -> Registry {
        let mut registry = Registry::empty(TableLayout::from(self.config));
        let discovered = match source.discover() {
            Ok(found) => found,
            Err(err) => {
                let subject = match source {
                    DeclarationSource::Directory(path) => path.display().to_string(),
                    DeclarationSource::Inline(_) => "<inline>".to_owned(),
                };
                registry.push_warning(Warning::new(
                    WarningKind::DiscoveryFailed,
                    subject,
                    format!("declaration source could not be enumerated: {err}"),
                ));
                return registry;
            }
        };

        for (subject, err) in discovered.rejected {
            registry.push_warning(Warning::new(
                WarningKind::InvalidDeclaration,
                subject,
                err.to_string(),
            ));
        }

        let mut models: Vec<ParsedModel> = Vec::with_capacity(discovered.declarations.len());
        for decl in &discovered.declarations {
            let model = self.parse(decl);
            if let Some(existing) = models
                .iter()
                .find(|m| m.name == model.name || m.entity_type == model.entity_type)
            {
                let message = format!(
                    "entity type {} already declared by '{}'; declaration skipped",
                    model.entity_type, existing.name
                );
                registry.push_warning(Warning::new(WarningKind::DuplicateEntity, &decl.name, message));
                continue;
            }
            debug!(entity = %model.name, attributes = model.attributes.len(), relationships = model.relationships.len(), "parsed entity");
            models.push(model);
        }

        let mut warnings = Vec::new();
        link_relationships(&mut models, &self.config.key_delimiter, &mut warnings);
        registry.warnings.extend(warnings);
        for model in models {
            registry.push_model(model);
        }
        info!(models = registry.models.len(), warnings = registry.warnings.len(), "registry skeleton built");
        registry
    }

    /// Normalises one declaration.
    pub fn parse(&self, decl: &EntityDeclaration) -> ParsedModel {
        let entity_type = decl.name.trim().to_uppercase();
        let delimiter = &self.config.key_delimiter;
        let mut attributes: Vec<Attribute> = decl.attributes.iter().map(infer_attribute).collect();
        inject_synthetic(&mut attributes, decl);

        let primary = key_template(&entity_type, delimiter, &decl.primary_key);
        ParsedModel {
            name: decl.name.trim().to_owned(),
            entity_type,
            primary_key: decl.primary_key.clone(),
            attributes,
            relationships: derive_relationships(decl),
            key_pattern: KeyPattern {
                partition_key: primary.clone(),
                sort_key: primary,
                indexes: BTreeMap::new(),
            },
            access_patterns: Vec::new(),
        }
    }
}

fn infer_attribute(decl: &AttributeDeclaration) -> Attribute {
    Attribute {
        name: decl.name.clone(),
        storage_type: infer_storage_type(decl.cast.as_deref(), decl.validation.as_deref()),
        required: decl.required,
        nullable: decl.nullable,
        unique: decl.unique,
        synthetic: false,
        index: None,
    }
}

fn inject_synthetic(attributes: &mut Vec<Attribute>, decl: &EntityDeclaration) {
    let traits = decl.traits;
    let mut add = |name: &str, storage_type: StorageType, required: bool, nullable: bool| {
        if attributes.iter().any(|a| a.name == name) {
            return;
        }
        attributes.push(Attribute {
            name: name.to_owned(),
            storage_type,
            required,
            nullable,
            unique: false,
            synthetic: true,
            index: None,
        });
    };
    if traits.generated_id {
        add(&decl.primary_key, StorageType::String, true, false);
    }
    if traits.timestamps {
        // datetime casts map to string storage
        let ty = infer_storage_type(Some("datetime"), None);
        add("createdAt", ty, false, false);
        add("updatedAt", ty, false, false);
    }
    if traits.soft_delete {
        add("deletedAt", StorageType::String, false, true);
    }
    if traits.time_to_live {
        add("ttl", StorageType::Number, false, true);
    }
    if traits.versioning {
        add("version", StorageType::Number, true, false);
    }
}
