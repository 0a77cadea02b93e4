//! Relationship derivation: defaults, index requirements and target linking.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::schema::declaration::{EntityDeclaration, RelationshipStub};
use crate::schema::model::{key_template, IndexKeyTemplate, ParsedModel, RelationKind, Relationship};
use crate::schema::naming::{camel, foreign_key_for, plural};
use crate::schema::warning::{Warning, WarningKind};

/// Builds the relationship records of one declaration.
///
/// Targets are not checked here; [`link_relationships`] does that once every
/// model is known. A `belongsTo` without an explicit local key gets an empty
/// one, filled with the related primary key during linking.
pub fn derive_relationships(decl: &EntityDeclaration) -> Vec<Relationship> {
    let groups = &decl.relationships;
    let kinds = [
        (RelationKind::HasOne, &groups.has_one),
        (RelationKind::HasMany, &groups.has_many),
        (RelationKind::BelongsTo, &groups.belongs_to),
        (RelationKind::BelongsToMany, &groups.belongs_to_many),
    ];
    let mut out = Vec::new();
    for (kind, stubs) in kinds {
        out.extend(stubs.iter().map(|stub| derive_one(decl, kind, stub)));
    }
    out
}

fn derive_one(decl: &EntityDeclaration, kind: RelationKind, stub: &RelationshipStub) -> Relationship {
    let opts = stub.options();
    let related = opts.model.trim().to_owned();
    let name = opts.name.unwrap_or_else(|| {
        if kind.is_many() {
            camel(&plural(&related))
        } else {
            camel(&related)
        }
    });
    // The reference lives on the owner for belongsTo, on the child or pivot
    // row for every other kind.
    let foreign_key = opts.foreign_key.unwrap_or_else(|| match kind {
        RelationKind::BelongsTo => foreign_key_for(&related),
        _ => foreign_key_for(&decl.name),
    });
    let local_key = opts.local_key.unwrap_or_else(|| match kind {
        RelationKind::BelongsTo => String::new(),
        _ => decl.primary_key.clone(),
    });
    let pivot = match kind {
        RelationKind::BelongsToMany => Some(opts.pivot.unwrap_or_else(|| pivot_name(&decl.name, &related))),
        _ => None,
    };
    Relationship {
        kind,
        name,
        related_model: related,
        foreign_key,
        local_key,
        pivot,
        requires_index: kind.requires_index(),
        index: None,
        resolved: true,
        index_keys: None,
    }
}

/// Order-independent pivot entity name: both names sorted and concatenated.
pub fn pivot_name(a: &str, b: &str) -> String {
    let mut pair = [a, b];
    pair.sort_unstable();
    pair.concat()
}

/// Checks every relationship target and fills in target-dependent details.
///
/// Unknown targets stay in the model, marked unresolved, with one warning
/// each. Resolved index-requiring relationships get the index key templates
/// they would occupy.
pub fn link_relationships(models: &mut [ParsedModel], delimiter: &str, warnings: &mut Vec<Warning>) {
    let targets: FxHashMap<String, (String, String)> = models
        .iter()
        .map(|m| (m.name.clone(), (m.entity_type.clone(), m.primary_key.clone())))
        .collect();

    for model in models.iter_mut() {
        let own_type = model.entity_type.clone();
        let own_pk = model.primary_key.clone();
        for rel in &mut model.relationships {
            let Some((related_type, related_pk)) = targets.get(&rel.related_model) else {
                rel.resolved = false;
                if rel.local_key.is_empty() {
                    rel.local_key = "id".to_owned();
                }
                let subject = format!("{}.{}", model.name, rel.name);
                let message = format!(
                    "{} relationship targets unknown entity '{}'; it is excluded from index assignment",
                    rel.kind, rel.related_model
                );
                warn!(subject = %subject, "{message}");
                warnings.push(Warning::new(WarningKind::UnknownRelatedModel, subject, message));
                continue;
            };
            if rel.local_key.is_empty() {
                rel.local_key = related_pk.clone();
            }
            rel.index_keys = match rel.kind {
                RelationKind::BelongsTo => Some(IndexKeyTemplate {
                    partition_key: key_template(related_type, delimiter, &rel.foreign_key),
                    sort_key: key_template(&own_type, delimiter, &own_pk),
                }),
                RelationKind::BelongsToMany => Some(IndexKeyTemplate {
                    partition_key: key_template(&own_type, delimiter, &rel.foreign_key),
                    sort_key: key_template(related_type, delimiter, &foreign_key_for(&rel.related_model)),
                }),
                RelationKind::HasOne | RelationKind::HasMany => None,
            };
        }
    }
}
