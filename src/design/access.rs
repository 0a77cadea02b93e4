//! Access pattern catalogue generation.

use crate::schema::model::{
    AccessPattern, Operation, ParsedModel, PatternKind, RelationKind, Relationship,
};
use crate::schema::naming::plural;
use crate::schema::registry::{Registry, TableLayout};

/// Regenerates every model's access patterns and the global catalogue.
///
/// Reads the final index assignments, so it runs after
/// [`crate::design::optimizer::assign_indexes`].
pub fn generate_access_patterns(registry: &mut Registry) {
    let mut all = Vec::new();
    for idx in 0..registry.models.len() {
        let patterns = patterns_for(&registry.models[idx], registry, &registry.layout);
        all.extend(patterns.iter().cloned());
        registry.models[idx].access_patterns = patterns;
    }
    registry.access_patterns = all;
}

fn patterns_for(model: &ParsedModel, registry: &Registry, layout: &TableLayout) -> Vec<AccessPattern> {
    let mut out = vec![point_get(model, layout), listing(model, layout)];
    for rel in model.relationships.iter().filter(|r| r.resolved) {
        let Some(related) = registry.model(&rel.related_model) else {
            continue;
        };
        out.push(traversal(model, rel, related, layout));
    }
    for attr in model.attributes.iter().filter(|a| a.unique) {
        out.push(unique_lookup(model, &attr.name, attr.index, layout));
    }
    out
}

fn point_get(model: &ParsedModel, layout: &TableLayout) -> AccessPattern {
    let key = &model.key_pattern.partition_key;
    AccessPattern {
        name: format!("Get {} by ID", model.name),
        description: format!("Fetch a single {} by its {}", model.name, model.primary_key),
        entity: model.name.clone(),
        kind: PatternKind::PointGet,
        operation: Operation::GetItem,
        subject: None,
        index: None,
        key_condition: format!(
            "{} = {key} AND {} = {}",
            layout.partition_key_attribute, layout.sort_key_attribute, model.key_pattern.sort_key
        ),
        partition_key: Some(key.clone()),
        sort_key: Some(model.key_pattern.sort_key.clone()),
        filter: None,
        efficient: true,
    }
}

fn listing(model: &ParsedModel, layout: &TableLayout) -> AccessPattern {
    let plural_name = plural(&model.name);
    AccessPattern {
        name: format!("List all {plural_name}"),
        description: format!("Scan the table for every {} row", model.name),
        entity: model.name.clone(),
        kind: PatternKind::Listing,
        operation: Operation::Scan,
        subject: None,
        index: None,
        key_condition: String::new(),
        partition_key: None,
        sort_key: None,
        filter: Some(format!("{} = {}", layout.entity_type_attribute, model.entity_type)),
        efficient: false,
    }
}

fn traversal(
    model: &ParsedModel,
    rel: &Relationship,
    related: &ParsedModel,
    layout: &TableLayout,
) -> AccessPattern {
    let d = &layout.key_delimiter;
    let own_pk = model.key_pattern.partition_key.clone();
    let related_prefix = related.key_prefix(d);
    let mut pattern = AccessPattern {
        name: String::new(),
        description: String::new(),
        entity: model.name.clone(),
        kind: PatternKind::Traversal(rel.kind),
        operation: Operation::Query,
        subject: Some(rel.name.clone()),
        index: rel.index,
        key_condition: String::new(),
        partition_key: None,
        sort_key: None,
        filter: None,
        efficient: true,
    };
    match rel.kind {
        RelationKind::HasOne | RelationKind::HasMany => {
            let target = if rel.kind == RelationKind::HasOne {
                related.name.clone()
            } else {
                plural(&related.name)
            };
            pattern.name = format!("Get {target} for {}", model.name);
            pattern.description = format!(
                "Query the {} partition for {} rows stored beside it",
                model.name, related.name
            );
            pattern.key_condition = format!(
                "{} = {own_pk} AND {} begins_with {related_prefix}",
                layout.partition_key_attribute, layout.sort_key_attribute
            );
            pattern.partition_key = Some(own_pk);
            pattern.sort_key = Some(related_prefix);
        }
        RelationKind::BelongsTo => {
            // Served from the related side: "which posts belong to this user".
            let related_pk = related.key_pattern.partition_key.clone();
            pattern.name = format!("Get {} by {}", plural(&model.name), related.name);
            match rel.index {
                Some(_) => {
                    pattern.description = format!(
                        "Query the reverse index for {} rows referencing a {}",
                        model.name, related.name
                    );
                    pattern.key_condition = format!("indexPk = {related_pk}");
                    pattern.partition_key = Some(related_pk);
                    pattern.sort_key = Some(model.key_prefix(d));
                }
                None => {
                    pattern.description = format!(
                        "Scan {} rows by {}; no index slot was available",
                        model.name, rel.foreign_key
                    );
                    pattern.operation = Operation::Scan;
                    pattern.filter = Some(format!(
                        "{} = {} AND {} = {{{}}}",
                        layout.entity_type_attribute, model.entity_type, rel.foreign_key, related.primary_key
                    ));
                    pattern.efficient = false;
                }
            }
        }
        RelationKind::BelongsToMany => {
            let pivot = rel.pivot.clone().unwrap_or_default();
            pattern.name = format!("Get {} for {}", plural(&related.name), model.name);
            match rel.index {
                Some(_) => {
                    pattern.description = format!(
                        "Query {pivot} pivot rows on the index, then batch-get the {} rows",
                        related.name
                    );
                    pattern.key_condition =
                        format!("indexPk = {own_pk} AND indexSk begins_with {related_prefix}");
                    pattern.partition_key = Some(own_pk);
                    pattern.sort_key = Some(related_prefix);
                }
                None => {
                    pattern.description = format!(
                        "Scan {pivot} pivot rows by {}; no index slot was available",
                        rel.foreign_key
                    );
                    pattern.operation = Operation::Scan;
                    pattern.filter = Some(format!("{} = {{{}}}", rel.foreign_key, model.primary_key));
                    pattern.efficient = false;
                }
            }
        }
    }
    pattern
}

fn unique_lookup(model: &ParsedModel, attr: &str, index: Option<u8>, layout: &TableLayout) -> AccessPattern {
    let d = &layout.key_delimiter;
    let partition = format!("{}{d}{attr}{d}{{{attr}}}", model.entity_type);
    let mut pattern = AccessPattern {
        name: format!("Get {} by {attr}", model.name),
        description: format!("Fetch the {} whose {attr} matches", model.name),
        entity: model.name.clone(),
        kind: PatternKind::UniqueLookup,
        operation: Operation::Query,
        subject: Some(attr.to_owned()),
        index,
        key_condition: format!("indexPk = {partition}"),
        partition_key: Some(partition),
        sort_key: None,
        filter: None,
        efficient: true,
    };
    if index.is_none() {
        pattern.operation = Operation::Scan;
        pattern.key_condition = String::new();
        pattern.partition_key = None;
        pattern.filter = Some(format!(
            "{} = {} AND {attr} = {{{attr}}}",
            layout.entity_type_attribute, model.entity_type
        ));
        pattern.efficient = false;
    }
    pattern
}
