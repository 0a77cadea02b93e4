#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use unitable::schema::model::{Operation, PatternKind, RelationKind};
use unitable::schema::naming::template_prefix;
use unitable::schema::{AttributeDeclaration, TraitFlags, WarningKind};
use unitable::{compile, Config, DeclarationSource, EntityDeclaration, Registry};

fn compile_inline(decls: Vec<EntityDeclaration>, config: &Config) -> Registry {
    compile(&DeclarationSource::Inline(decls), config)
}

#[test]
fn belongs_to_gets_first_index_and_reverse_pattern() {
    let registry = compile_inline(
        vec![
            EntityDeclaration::new("User").has_many("Post"),
            EntityDeclaration::new("Post").belongs_to("User"),
        ],
        &Config::default(),
    );
    assert!(registry.warnings.is_empty(), "{:?}", registry.warnings);
    assert_eq!(registry.index_for("Post", "User"), Some(1));

    let post = registry.model("Post").expect("post model");
    let user_rel = post.relationship("user").expect("user relationship");
    assert_eq!(user_rel.foreign_key, "userId");
    assert_eq!(user_rel.index, Some(1));

    let pattern = registry
        .patterns_for("Post")
        .find(|p| p.name == "Get Posts by User")
        .expect("reverse lookup pattern");
    assert_eq!(pattern.operation, Operation::Query);
    assert_eq!(pattern.index, Some(1));
    assert_eq!(pattern.key_condition, "indexPk = USER#{id}");

    let listing = registry
        .patterns_for("User")
        .find(|p| p.kind == PatternKind::Traversal(RelationKind::HasMany))
        .expect("hasMany pattern");
    assert_eq!(listing.name, "Get Posts for User");
    assert_eq!(listing.key_condition, "pk = USER#{id} AND sk begins_with POST#");
    assert!(registry.validate().success);
}

#[test]
fn sixth_same_prefix_lookup_exhausts_the_pool() {
    let mut decls = vec![EntityDeclaration::new("User")];
    for name in ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"] {
        decls.push(EntityDeclaration::new(name).belongs_to("User"));
    }
    let registry = compile_inline(decls, &Config::default());

    assert_eq!(registry.indexes.len(), 5);
    assert_eq!(registry.warnings.len(), 1);
    let warning = &registry.warnings[0];
    assert_eq!(warning.kind, WarningKind::IndexPoolExhausted);
    assert_eq!(warning.subject, "Foxtrot.user");

    let foxtrot = registry.model("Foxtrot").expect("foxtrot model");
    assert_eq!(foxtrot.relationship("user").and_then(|r| r.index), None);
    let fallback = registry
        .patterns_for("Foxtrot")
        .find(|p| p.name == "Get Foxtrots by User")
        .expect("fallback pattern");
    assert_eq!(fallback.operation, Operation::Scan);
    assert!(!fallback.efficient);
}

#[test]
fn distinct_prefixes_share_one_slot() {
    let registry = compile_inline(
        vec![
            EntityDeclaration::new("User"),
            EntityDeclaration::new("Team"),
            EntityDeclaration::new("Post").belongs_to("User"),
            EntityDeclaration::new("Project").belongs_to("Team"),
        ],
        &Config::default(),
    );
    assert_eq!(registry.index_for("Post", "User"), Some(1));
    assert_eq!(registry.index_for("Project", "Team"), Some(1));
    assert_eq!(registry.index_usage.len(), 1);
    assert_eq!(registry.index_usage[0].pattern_count, 2);
}

#[test]
fn compilation_is_deterministic() {
    let decls = || {
        vec![
            EntityDeclaration::new("User")
                .has_many("Post")
                .belongs_to_many("Role")
                .attribute(AttributeDeclaration::new("email").unique())
                .traits(TraitFlags {
                    timestamps: true,
                    ..TraitFlags::default()
                }),
            EntityDeclaration::new("Post").belongs_to("User").has_many("Comment"),
            EntityDeclaration::new("Comment").belongs_to("Post").belongs_to("User"),
            EntityDeclaration::new("Role"),
        ]
    };
    let config = Config::default();
    let first = compile_inline(decls(), &config);
    let second = compile_inline(decls(), &config);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.index_assignments, second.index_assignments);
    assert_eq!(
        serde_json::to_value(&first).expect("serialize"),
        serde_json::to_value(&second).expect("serialize")
    );
}

#[test]
fn entity_types_are_unique() {
    let registry = compile_inline(
        vec![
            EntityDeclaration::new("User"),
            EntityDeclaration::new("user"),
            EntityDeclaration::new("Post"),
        ],
        &Config::default(),
    );
    let types: BTreeSet<&str> = registry.models.iter().map(|m| m.entity_type.as_str()).collect();
    assert_eq!(types.len(), registry.models.len());
    assert!(registry
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::DuplicateEntity));
}

#[test]
fn unresolved_target_is_reported_not_fatal() {
    let registry = compile_inline(
        vec![EntityDeclaration::new("Post").belongs_to("Ghost")],
        &Config::default(),
    );
    assert_eq!(registry.models.len(), 1);
    assert_eq!(registry.warnings.len(), 1);
    assert_eq!(registry.warnings[0].kind, WarningKind::UnknownRelatedModel);
    assert!(registry.indexes.is_empty());
}

#[test]
fn over_ceiling_configuration_fails_validation() {
    let mut user = EntityDeclaration::new("User");
    for i in 0..21 {
        user = user.attribute(AttributeDeclaration::new(format!("handle{i}")).unique());
    }
    let decls = vec![user];
    let config = Config {
        max_index_count: 25,
        ..Config::default()
    };
    let registry = compile_inline(decls, &config);
    let report = registry.validate();
    assert!(registry.indexes.len() > 20);
    assert!(!report.success);
    assert_eq!(report.errors[0].code(), "TooManyIndexes");
}

fn arb_design() -> impl Strategy<Value = (usize, BTreeSet<(usize, usize)>, usize)> {
    (2usize..=8).prop_flat_map(|entities| {
        (
            Just(entities),
            prop::collection::btree_set((0..entities, 0..entities), 0..=16),
            1usize..=5,
        )
    })
}

proptest! {
    #[test]
    fn no_slot_holds_two_patterns_with_one_prefix((entities, edges, max) in arb_design()) {
        let mut decls: Vec<EntityDeclaration> =
            (0..entities).map(|i| EntityDeclaration::new(format!("E{i}"))).collect();
        for (child, parent) in edges {
            if child != parent {
                decls[child] = decls[child].clone().belongs_to(format!("E{parent}"));
            }
        }
        let config = Config { max_index_count: max, ..Config::default() };
        let registry = compile_inline(decls, &config);

        let mut prefixes: BTreeMap<u8, Vec<String>> = BTreeMap::new();
        for model in &registry.models {
            for (number, keys) in &model.key_pattern.indexes {
                prefixes
                    .entry(*number)
                    .or_default()
                    .push(template_prefix(&keys.partition_key).to_owned());
            }
        }
        for (number, list) in &prefixes {
            let distinct: BTreeSet<&String> = list.iter().collect();
            prop_assert_eq!(distinct.len(), list.len(), "slot {} repeats a prefix", number);
        }
        prop_assert!(registry.indexes.len() <= max);
        for usage in &registry.index_usage {
            prop_assert!(usage.pattern_count <= 5);
        }
    }
}
