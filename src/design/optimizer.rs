//! Secondary index allocation with index overloading.
//!
//! Relationships that need a reverse lookup are packed onto a small pool of
//! index slots. A slot may serve several unrelated entities as long as their
//! partition-key prefixes differ, which keeps every lookup unambiguous on an
//! index scan. Unique-attribute lookups always get a slot of their own.

use serde::Serialize;
use tracing::debug;

use crate::config::{Config, ConsolidationCheck};
use crate::schema::model::{key_template, IndexKeyTemplate, RelationKind};
use crate::schema::naming::template_prefix;
use crate::schema::registry::{relation_assignment_key, unique_assignment_key, Registry};
use crate::schema::warning::{Warning, WarningKind};

/// Patterns a single slot may carry before it is considered full.
pub const MAX_PATTERNS_PER_INDEX: usize = 5;

/// Rough read pressure of a slot, by attached pattern count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadEstimate {
    /// One pattern.
    Low,
    /// Two or three patterns.
    Medium,
    /// More than three patterns.
    High,
}

impl LoadEstimate {
    /// Classifies an attached-pattern count.
    pub fn from_count(count: usize) -> Self {
        match count {
            0 | 1 => LoadEstimate::Low,
            2 | 3 => LoadEstimate::Medium,
            _ => LoadEstimate::High,
        }
    }
}

/// A secondary index the design requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    /// Slot number, starting at 1.
    pub number: u8,
    /// Index name.
    pub name: String,
    /// Index partition-key attribute.
    pub partition_key: String,
    /// Index sort-key attribute.
    pub sort_key: String,
}

impl IndexDefinition {
    /// Definition of slot `number` under `config`'s naming overrides.
    pub fn from_config(config: &Config, number: u8) -> Self {
        Self {
            number,
            name: config.index_name(number),
            partition_key: config.index_partition_attribute(number),
            sort_key: config.index_sort_attribute(number),
        }
    }
}

/// What one slot ended up serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexUsage {
    /// Slot number.
    pub index: u8,
    /// Index name.
    pub name: String,
    /// Assignment keys attached to the slot, in attachment order.
    pub patterns: Vec<String>,
    /// Distinct entities whose rows carry the slot's keys.
    pub entities: Vec<String>,
    /// Number of attached patterns.
    pub pattern_count: usize,
    /// Load classification.
    pub load: LoadEstimate,
    /// Reserved for a single unique lookup.
    pub dedicated: bool,
}

#[derive(Debug)]
struct SlotPattern {
    key: String,
    entity: String,
    prefix: String,
}

#[derive(Debug)]
struct IndexSlot {
    number: u8,
    dedicated: bool,
    patterns: Vec<SlotPattern>,
}

impl IndexSlot {
    fn accepts(&self, entity: &str, prefix: &str, config: &Config) -> bool {
        if self.dedicated || self.patterns.len() >= MAX_PATTERNS_PER_INDEX {
            return false;
        }
        if config.exclusive_entity_slots && self.patterns.iter().any(|p| p.entity == entity) {
            return false;
        }
        match config.consolidation {
            ConsolidationCheck::AllPatterns => self.patterns.iter().all(|p| p.prefix != prefix),
            ConsolidationCheck::FirstPattern => self
                .patterns
                .first()
                .is_some_and(|first| first.prefix != prefix),
        }
    }
}

struct Candidate {
    model: usize,
    relationship: usize,
    key: String,
    entity: String,
    keys: IndexKeyTemplate,
}

/// Assigns index slots across the registry.
///
/// Walks `belongsTo` relationships, then `belongsToMany`, then unique
/// attributes, each in declaration order. Exhaustion leaves the lookup
/// unassigned and records a warning.
pub fn assign_indexes(registry: &mut Registry, config: &Config) {
    let mut slots: Vec<IndexSlot> = Vec::new();

    for candidate in relationship_candidates(registry) {
        let prefix = template_prefix(&candidate.keys.partition_key).to_owned();
        let existing = slots
            .iter()
            .position(|slot| slot.accepts(&candidate.entity, &prefix, config));
        let slot_idx = match existing {
            Some(idx) => Some(idx),
            None => allocate(&mut slots, config, false),
        };
        let is_pivot = registry.models[candidate.model].relationships[candidate.relationship].kind
            == RelationKind::BelongsToMany;
        let Some(idx) = slot_idx else {
            let model = &registry.models[candidate.model];
            let rel = &model.relationships[candidate.relationship];
            let subject = format!("{}.{}", model.name, rel.name);
            let message = format!(
                "no index slot left for {} {} (max {}); lookups fall back to a scan",
                rel.kind, rel.related_model, config.max_index_count
            );
            registry.push_warning(Warning::new(WarningKind::IndexPoolExhausted, subject, message));
            continue;
        };
        let slot = &mut slots[idx];
        debug!(
            key = %candidate.key,
            index = slot.number,
            prefix = %prefix,
            overloaded = existing.is_some(),
            "assigned relationship index"
        );
        slot.patterns.push(SlotPattern {
            key: candidate.key.clone(),
            entity: candidate.entity.clone(),
            prefix,
        });
        let number = slot.number;
        registry.index_assignments.insert(candidate.key, number);
        let model = &mut registry.models[candidate.model];
        model.relationships[candidate.relationship].index = Some(number);
        let target = if is_pivot {
            registry.model_index(&candidate.entity)
        } else {
            Some(candidate.model)
        };
        if let Some(target) = target {
            // The first template installed on a slot keeps the row's key pair.
            let indexes = &mut registry.models[target].key_pattern.indexes;
            if indexes.contains_key(&number) {
                debug!(entity = %candidate.entity, index = number, "row already projects onto this index");
            } else {
                indexes.insert(number, candidate.keys);
            }
        }
    }

    assign_unique(registry, config, &mut slots);

    registry.indexes = slots
        .iter()
        .map(|slot| IndexDefinition::from_config(config, slot.number))
        .collect();
    registry.index_usage = slots
        .iter()
        .map(|slot| {
            let mut entities: Vec<String> = Vec::new();
            for pattern in &slot.patterns {
                if !entities.contains(&pattern.entity) {
                    entities.push(pattern.entity.clone());
                }
            }
            IndexUsage {
                index: slot.number,
                name: config.index_name(slot.number),
                patterns: slot.patterns.iter().map(|p| p.key.clone()).collect(),
                entities,
                pattern_count: slot.patterns.len(),
                load: LoadEstimate::from_count(slot.patterns.len()),
                dedicated: slot.dedicated,
            }
        })
        .collect();
}

fn relationship_candidates(registry: &Registry) -> Vec<Candidate> {
    let mut out = Vec::new();
    for kind in [RelationKind::BelongsTo, RelationKind::BelongsToMany] {
        for (model_idx, model) in registry.models.iter().enumerate() {
            for (rel_idx, rel) in model.relationships.iter().enumerate() {
                if rel.kind != kind || !rel.resolved || !rel.requires_index {
                    continue;
                }
                let Some(keys) = rel.index_keys.clone() else {
                    continue;
                };
                let mut key = relation_assignment_key(&model.name, &rel.related_model);
                if out.iter().any(|c: &Candidate| c.key == key) {
                    key = format!("{key}:{}", rel.name);
                }
                let entity = match kind {
                    RelationKind::BelongsToMany => rel.pivot.clone().unwrap_or_default(),
                    _ => model.name.clone(),
                };
                out.push(Candidate {
                    model: model_idx,
                    relationship: rel_idx,
                    key,
                    entity,
                    keys,
                });
            }
        }
    }
    out
}

fn assign_unique(registry: &mut Registry, config: &Config, slots: &mut Vec<IndexSlot>) {
    let delimiter = registry.layout.key_delimiter.clone();
    for model_idx in 0..registry.models.len() {
        for attr_idx in 0..registry.models[model_idx].attributes.len() {
            let model = &registry.models[model_idx];
            let attr = &model.attributes[attr_idx];
            if !attr.unique {
                continue;
            }
            let key = unique_assignment_key(&model.name, &attr.name);
            let Some(idx) = allocate(slots, config, true) else {
                let subject = format!("{}.{}", model.name, attr.name);
                let message = format!(
                    "no index slot left for unique attribute (max {}); lookups fall back to a scan",
                    config.max_index_count
                );
                registry.push_warning(Warning::new(WarningKind::IndexPoolExhausted, subject, message));
                continue;
            };
            let keys = IndexKeyTemplate {
                partition_key: key_template(
                    &format!("{}{delimiter}{}", model.entity_type, attr.name),
                    &delimiter,
                    &attr.name,
                ),
                sort_key: model.key_pattern.sort_key.clone(),
            };
            let slot = &mut slots[idx];
            slot.patterns.push(SlotPattern {
                key: key.clone(),
                entity: model.name.clone(),
                prefix: template_prefix(&keys.partition_key).to_owned(),
            });
            let number = slot.number;
            debug!(key = %key, index = number, "assigned unique index");
            registry.index_assignments.insert(key, number);
            let model = &mut registry.models[model_idx];
            model.attributes[attr_idx].index = Some(number);
            model.key_pattern.indexes.insert(number, keys);
        }
    }
}

fn allocate(slots: &mut Vec<IndexSlot>, config: &Config, dedicated: bool) -> Option<usize> {
    if slots.len() >= config.max_index_count {
        return None;
    }
    let number = u8::try_from(slots.len() + 1).ok()?;
    slots.push(IndexSlot {
        number,
        dedicated,
        patterns: Vec::new(),
    });
    Some(slots.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::declaration::{AttributeDeclaration, EntityDeclaration};
    use crate::schema::registry::RegistryBuilder;
    use crate::schema::source::DeclarationSource;

    fn assigned(decls: Vec<EntityDeclaration>, config: &Config) -> Registry {
        let mut registry = RegistryBuilder::new(config).build(&DeclarationSource::Inline(decls));
        assign_indexes(&mut registry, config);
        registry
    }

    #[test]
    fn load_thresholds() {
        assert_eq!(LoadEstimate::from_count(1), LoadEstimate::Low);
        assert_eq!(LoadEstimate::from_count(2), LoadEstimate::Medium);
        assert_eq!(LoadEstimate::from_count(3), LoadEstimate::Medium);
        assert_eq!(LoadEstimate::from_count(4), LoadEstimate::High);
    }

    #[test]
    fn different_prefixes_share_a_slot() {
        let registry = assigned(
            vec![
                EntityDeclaration::new("User"),
                EntityDeclaration::new("Org"),
                EntityDeclaration::new("Post").belongs_to("User"),
                EntityDeclaration::new("Team").belongs_to("Org"),
            ],
            &Config::default(),
        );
        assert_eq!(registry.index_for("Post", "User"), Some(1));
        assert_eq!(registry.index_for("Team", "Org"), Some(1));
        assert_eq!(registry.indexes.len(), 1);
        let usage = &registry.index_usage[0];
        assert_eq!(usage.pattern_count, 2);
        assert_eq!(usage.load, LoadEstimate::Medium);
        assert_eq!(usage.entities, ["Post", "Team"]);
    }

    #[test]
    fn same_prefix_never_shares_a_slot() {
        let registry = assigned(
            vec![
                EntityDeclaration::new("User"),
                EntityDeclaration::new("Post").belongs_to("User"),
                EntityDeclaration::new("Comment").belongs_to("User"),
            ],
            &Config::default(),
        );
        assert_eq!(registry.index_for("Post", "User"), Some(1));
        assert_eq!(registry.index_for("Comment", "User"), Some(2));
    }

    fn post_with_two_owners() -> Vec<EntityDeclaration> {
        vec![
            EntityDeclaration::new("User"),
            EntityDeclaration::new("Category"),
            EntityDeclaration::new("Post")
                .belongs_to("User")
                .belongs_to("Category"),
        ]
    }

    #[test]
    fn one_entity_may_share_a_slot_by_default() {
        for config in [Config::default(), Config::legacy()] {
            let registry = assigned(post_with_two_owners(), &config);
            assert_eq!(registry.index_for("Post", "User"), Some(1));
            assert_eq!(registry.index_for("Post", "Category"), Some(1));
            assert_eq!(registry.indexes.len(), 1);
            let post = registry.model("Post").unwrap();
            assert_eq!(post.relationships[1].index, Some(1));
            assert_eq!(post.key_pattern.indexes[&1].partition_key, "USER#{userId}");
        }
    }

    #[test]
    fn exclusive_entity_slots_split_one_entity_across_slots() {
        let config = Config {
            exclusive_entity_slots: true,
            ..Config::default()
        };
        let registry = assigned(post_with_two_owners(), &config);
        let post = registry.model("Post").unwrap();
        assert_eq!(post.relationships[0].index, Some(1));
        assert_eq!(post.relationships[1].index, Some(2));
        assert_eq!(post.key_pattern.indexes[&1].partition_key, "USER#{userId}");
        assert_eq!(post.key_pattern.indexes[&2].partition_key, "CATEGORY#{categoryId}");
    }

    #[test]
    fn first_pattern_check_allows_hidden_collision() {
        let decls = vec![
            EntityDeclaration::new("User"),
            EntityDeclaration::new("Org"),
            EntityDeclaration::new("Post").belongs_to("User"),
            EntityDeclaration::new("Team").belongs_to("Org"),
            EntityDeclaration::new("Project").belongs_to("Org"),
        ];
        let strict = assigned(decls.clone(), &Config::default());
        assert_eq!(strict.index_for("Team", "Org"), Some(1));
        assert_eq!(strict.index_for("Project", "Org"), Some(2));

        let legacy = assigned(decls, &Config::legacy());
        assert_eq!(legacy.index_for("Team", "Org"), Some(1));
        assert_eq!(legacy.index_for("Project", "Org"), Some(1));
    }

    #[test]
    fn unique_attributes_get_dedicated_slots() {
        let registry = assigned(
            vec![
                EntityDeclaration::new("User")
                    .attribute(AttributeDeclaration::new("email").unique())
                    .attribute(AttributeDeclaration::new("handle").unique()),
                EntityDeclaration::new("Post").belongs_to("User"),
            ],
            &Config::default(),
        );
        assert_eq!(registry.index_for("Post", "User"), Some(1));
        assert_eq!(registry.unique_index_for("User", "email"), Some(2));
        assert_eq!(registry.unique_index_for("User", "handle"), Some(3));
        let user = registry.model("User").unwrap();
        assert_eq!(user.key_pattern.indexes[&2].partition_key, "USER#email#{email}");
        assert!(registry.index_usage[1].dedicated);
        assert_eq!(registry.index_usage[1].pattern_count, 1);
    }

    #[test]
    fn exhaustion_warns_and_leaves_unassigned() {
        let config = Config {
            max_index_count: 1,
            ..Config::default()
        };
        let registry = assigned(
            vec![
                EntityDeclaration::new("User").attribute(AttributeDeclaration::new("email").unique()),
                EntityDeclaration::new("Post").belongs_to("User"),
            ],
            &config,
        );
        assert_eq!(registry.index_for("Post", "User"), Some(1));
        assert_eq!(registry.unique_index_for("User", "email"), None);
        assert_eq!(registry.warnings.len(), 1);
        assert_eq!(registry.warnings[0].subject, "User.email");
    }

    #[test]
    fn slot_caps_at_five_patterns() {
        let mut decls = Vec::new();
        for i in 0..6 {
            decls.push(EntityDeclaration::new(format!("Parent{i}")));
            decls.push(EntityDeclaration::new(format!("Child{i}")).belongs_to(format!("Parent{i}")));
        }
        let registry = assigned(decls, &Config::default());
        assert_eq!(registry.index_usage[0].pattern_count, MAX_PATTERNS_PER_INDEX);
        assert_eq!(registry.index_for("Child5", "Parent5"), Some(2));
    }

    #[test]
    fn many_to_many_keys_land_on_the_pivot_model() {
        let registry = assigned(
            vec![
                EntityDeclaration::new("User").belongs_to_many("Role"),
                EntityDeclaration::new("Role"),
                EntityDeclaration::new("RoleUser"),
            ],
            &Config::default(),
        );
        let rel = &registry.model("User").unwrap().relationships[0];
        assert_eq!(rel.index, Some(1));
        let pivot = registry.model("RoleUser").unwrap();
        assert_eq!(pivot.key_pattern.indexes[&1].partition_key, "USER#{userId}");
        assert_eq!(pivot.key_pattern.indexes[&1].sort_key, "ROLE#{roleId}");
    }
}
