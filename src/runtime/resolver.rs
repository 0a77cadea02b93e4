//! Single relationship resolution against a compiled registry.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::runtime::cache::{cache_key, RelationData, RelationshipCache};
use crate::runtime::executor::{Item, ItemKey, KeyCondition, QueryExecutor, RangeQuery};
use crate::schema::model::{ParsedModel, RelationKind, Relationship};
use crate::schema::registry::Registry;

/// Outcome of resolving one relationship on one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationResult {
    /// Relationship name as requested.
    pub name: String,
    /// Relationship kind, absent when the name is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RelationKind>,
    /// Loaded payload; `None` serializes as `null`.
    pub data: Option<RelationData>,
    /// True when a lookup ran or was answered from cache.
    pub loaded: bool,
    /// Row count for collection relationships.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl RelationResult {
    fn not_loaded(name: &str, kind: Option<RelationKind>) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            data: None,
            loaded: false,
            count: None,
        }
    }

    fn loaded(rel: &Relationship, data: Option<RelationData>) -> Self {
        let count = match (&data, rel.kind.is_many()) {
            (Some(data), true) => Some(data.len()),
            (None, true) => Some(0),
            _ => None,
        };
        Self {
            name: rel.name.clone(),
            kind: Some(rel.kind),
            data,
            loaded: true,
            count,
        }
    }

    /// JSON value to merge into the parent row.
    pub fn into_value(self) -> Value {
        self.data.map_or(Value::Null, RelationData::into_value)
    }
}

/// Resolves relationships by dispatching lookups to an executor.
#[derive(Debug)]
pub struct Resolver<'a, E> {
    registry: &'a Registry,
    executor: &'a E,
}

impl<'a, E> Clone for Resolver<'a, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, E> Copy for Resolver<'a, E> {}

impl<'a, E: QueryExecutor> Resolver<'a, E> {
    /// Binds a registry to an executor.
    pub fn new(registry: &'a Registry, executor: &'a E) -> Self {
        Self { registry, executor }
    }

    /// Registry used for lookups.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Executor used for lookups.
    pub fn executor(&self) -> &'a E {
        self.executor
    }

    /// Resolves relationship `name` of `instance`.
    ///
    /// Unknown names, unresolved targets and missing keys yield a result with
    /// `loaded == false` and no executor call. Executor errors propagate.
    pub async fn resolve(
        &self,
        model: &ParsedModel,
        instance: &Item,
        name: &str,
        mut cache: Option<&mut RelationshipCache>,
    ) -> Result<RelationResult, E::Error> {
        let Some(rel) = model.relationship(name) else {
            debug!(model = %model.name, relationship = name, "unknown relationship");
            return Ok(RelationResult::not_loaded(name, None));
        };
        let Some(related) = self.resolvable_target(rel) else {
            return Ok(RelationResult::not_loaded(name, Some(rel.kind)));
        };

        let key = instance_key(model, instance).map(|id| cache_key(&model.name, &id, &rel.name));
        if let (Some(cache), Some(key)) = (cache.as_deref_mut(), key.as_deref()) {
            if let Some(data) = cache.get(key) {
                debug!(cache_key = key, "relationship cache hit");
                return Ok(RelationResult::loaded(rel, Some(data.clone())));
            }
        }

        let data = match rel.kind {
            RelationKind::BelongsTo => {
                let Some(fk) = instance.get(&rel.foreign_key).filter(|v| is_truthy(v)).and_then(key_string) else {
                    debug!(model = %model.name, relationship = name, "foreign key absent");
                    return Ok(RelationResult::not_loaded(name, Some(rel.kind)));
                };
                self.fetch_owner(related, &fk).await?.map(RelationData::One)
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let Some(id) = instance_key(model, instance) else {
                    return Ok(RelationResult::not_loaded(name, Some(rel.kind)));
                };
                let rows = self.fetch_children(model, related, rel, &id).await?;
                if rel.kind == RelationKind::HasOne {
                    rows.into_iter().next().map(RelationData::One)
                } else {
                    Some(RelationData::Many(rows))
                }
            }
            RelationKind::BelongsToMany => {
                let Some(id) = instance_key(model, instance) else {
                    return Ok(RelationResult::not_loaded(name, Some(rel.kind)));
                };
                match self.fetch_many_to_many(model, related, rel, &id).await? {
                    Some(rows) => Some(RelationData::Many(rows)),
                    None => return Ok(RelationResult::not_loaded(name, Some(rel.kind))),
                }
            }
        };

        if let (Some(cache), Some(key), Some(data)) = (cache, key, data.as_ref()) {
            cache.insert(key, data.clone());
        }
        Ok(RelationResult::loaded(rel, data))
    }

    pub(crate) fn resolvable_target(&self, rel: &Relationship) -> Option<&'a ParsedModel> {
        if !rel.resolved {
            return None;
        }
        self.registry.model(&rel.related_model)
    }

    pub(crate) fn owner_key(&self, related: &ParsedModel, fk: &str) -> ItemKey {
        ItemKey::entity(related.entity_key(&self.registry.layout.key_delimiter, fk))
    }

    pub(crate) fn children_query(
        &self,
        model: &ParsedModel,
        related: &ParsedModel,
        rel: &Relationship,
        id: &str,
    ) -> RangeQuery {
        let layout = &self.registry.layout;
        let key = KeyCondition::partition(
            &layout.partition_key_attribute,
            model.entity_key(&layout.key_delimiter, id),
        )
        .begins_with(&layout.sort_key_attribute, related.key_prefix(&layout.key_delimiter));
        let query = RangeQuery::new(key);
        if rel.kind == RelationKind::HasOne {
            query.limit(1)
        } else {
            query
        }
    }

    async fn fetch_owner(&self, related: &ParsedModel, fk: &str) -> Result<Option<Item>, E::Error> {
        let key = self.owner_key(related, fk);
        debug!(pk = %key.partition_key, "point get for belongsTo");
        self.executor.point_get(&self.registry.layout.table_name, &key).await
    }

    async fn fetch_children(
        &self,
        model: &ParsedModel,
        related: &ParsedModel,
        rel: &Relationship,
        id: &str,
    ) -> Result<Vec<Item>, E::Error> {
        let query = self.children_query(model, related, rel, id);
        debug!(query = %query, kind = %rel.kind, "range query for children");
        self.executor.range_query(&self.registry.layout.table_name, &query).await
    }

    /// `None` when the relationship has no index to query.
    async fn fetch_many_to_many(
        &self,
        model: &ParsedModel,
        related: &ParsedModel,
        rel: &Relationship,
        id: &str,
    ) -> Result<Option<Vec<Item>>, E::Error> {
        let Some(def) = rel.index.and_then(|n| self.registry.index(n)) else {
            debug!(model = %model.name, relationship = %rel.name, "no index assigned");
            return Ok(None);
        };
        let layout = &self.registry.layout;
        let query = RangeQuery::new(
            KeyCondition::partition(&def.partition_key, model.entity_key(&layout.key_delimiter, id))
                .begins_with(&def.sort_key, related.key_prefix(&layout.key_delimiter)),
        )
        .on_index(&def.name);
        debug!(query = %query, "index query for pivot rows");
        let pivots = self.executor.range_query(&layout.table_name, &query).await?;

        let mut keys: Vec<ItemKey> = Vec::with_capacity(pivots.len());
        for pivot in &pivots {
            let target = pivot
                .get(&def.sort_key)
                .or_else(|| pivot.get(&layout.sort_key_attribute))
                .and_then(Value::as_str);
            if let Some(target) = target {
                let key = ItemKey::entity(target);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        if keys.is_empty() {
            return Ok(Some(Vec::new()));
        }
        debug!(keys = keys.len(), "batch get for pivot targets");
        self.executor.batch_get(&layout.table_name, &keys).await.map(Some)
    }
}

/// Resolves relationship `name` of `instance`.
///
/// Convenience wrapper over [`Resolver::resolve`].
pub async fn resolve_relationship<E: QueryExecutor>(
    model: &ParsedModel,
    instance: &Item,
    name: &str,
    registry: &Registry,
    executor: &E,
    cache: Option<&mut RelationshipCache>,
) -> Result<RelationResult, E::Error> {
    Resolver::new(registry, executor).resolve(model, instance, name, cache).await
}

/// Primary-key value of `instance` as a key string.
pub(crate) fn instance_key(model: &ParsedModel, instance: &Item) -> Option<String> {
    instance.get(&model.primary_key).and_then(key_string)
}

/// String form of a scalar usable in a key.
pub(crate) fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Null, false, zero and the empty string count as absent.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
