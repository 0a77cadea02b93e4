//! Eager loading of relationship trees over one or many instances.
//!
//! Loading a relationship across N siblings one by one costs N round trips.
//! When more than one instance is loaded, a prefetch pass fills the
//! request cache first: `belongsTo` owners come back from a single batch get
//! and `hasMany` children from concurrent range queries. The per-instance
//! resolution that follows is then answered from the cache. Owners the batch
//! get did not return are remembered for the rest of the call so dangling
//! references are not fetched again one at a time.

use futures::future::try_join_all;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, trace};

use crate::runtime::cache::{cache_key, RelationData, RelationshipCache};
use crate::runtime::executor::{Item, ItemKey, QueryExecutor};
use crate::runtime::resolver::{instance_key, is_truthy, key_string, Resolver};
use crate::schema::model::{ParsedModel, RelationKind, Relationship};
use crate::schema::registry::Registry;

/// One relationship to load, with the relationships to load beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagerSpec {
    /// Relationship name on the current model.
    pub name: String,
    /// Relationships of the related model.
    pub nested: Vec<EagerSpec>,
}

impl EagerSpec {
    /// Leaf spec.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested: Vec::new(),
        }
    }

    /// Adds a nested spec.
    pub fn with(mut self, nested: EagerSpec) -> Self {
        self.nested.push(nested);
        self
    }

    /// Builds the load tree from dotted paths such as `posts.comments`.
    ///
    /// Paths sharing a prefix are merged; empty segments are skipped.
    pub fn parse<I, S>(paths: I) -> Vec<EagerSpec>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roots: Vec<EagerSpec> = Vec::new();
        for path in paths {
            let mut level = &mut roots;
            for segment in path.as_ref().split('.').map(str::trim).filter(|s| !s.is_empty()) {
                let pos = match level.iter().position(|spec| spec.name == segment) {
                    Some(pos) => pos,
                    None => {
                        level.push(EagerSpec::new(segment));
                        level.len() - 1
                    }
                };
                level = &mut level[pos].nested;
            }
        }
        roots
    }
}

/// Loads relationship trees into instance rows.
///
/// Each loaded relationship is merged into the returned row under its name:
/// an object for single relationships, an array for collections and `null`
/// when nothing was found or the relationship could not be resolved.
#[derive(Debug)]
pub struct EagerLoader<'a, E> {
    resolver: Resolver<'a, E>,
}

impl<'a, E: QueryExecutor> EagerLoader<'a, E> {
    /// Binds a registry to an executor.
    pub fn new(registry: &'a Registry, executor: &'a E) -> Self {
        Self {
            resolver: Resolver::new(registry, executor),
        }
    }

    /// Loads `specs` for a single instance.
    pub async fn load(
        &self,
        model: &ParsedModel,
        instance: &Item,
        specs: &[EagerSpec],
        cache: &mut RelationshipCache,
    ) -> Result<Item, E::Error> {
        let mut loaded = self.load_many(model, std::slice::from_ref(instance), specs, cache).await?;
        Ok(loaded.pop().unwrap_or_else(|| instance.clone()))
    }

    /// Loads `specs` for every instance, prefetching when there is more than one.
    pub async fn load_many(
        &self,
        model: &ParsedModel,
        instances: &[Item],
        specs: &[EagerSpec],
        cache: &mut RelationshipCache,
    ) -> Result<Vec<Item>, E::Error> {
        let mut out: Vec<Item> = instances.to_vec();
        if instances.is_empty() || specs.is_empty() {
            return Ok(out);
        }

        let mut missing: FxHashSet<String> = FxHashSet::default();
        if instances.len() > 1 {
            for spec in specs {
                if let Some(rel) = model.relationship(&spec.name) {
                    self.prefetch(model, instances, rel, cache, &mut missing).await?;
                }
            }
        }

        for spec in specs {
            let mut per_instance: Vec<Option<RelationData>> = Vec::with_capacity(instances.len());
            for instance in instances {
                let known_missing = instance_key(model, instance)
                    .is_some_and(|id| missing.contains(&cache_key(&model.name, &id, &spec.name)));
                if known_missing {
                    per_instance.push(None);
                    continue;
                }
                let result = self
                    .resolver
                    .resolve(model, instance, &spec.name, Some(&mut *cache))
                    .await?;
                per_instance.push(result.data);
            }

            if !spec.nested.is_empty() {
                let related = model
                    .relationship(&spec.name)
                    .and_then(|rel| self.resolver.resolvable_target(rel));
                if let Some(related) = related {
                    self.load_nested(related, &mut per_instance, &spec.nested, cache).await?;
                }
            }

            for (row, data) in out.iter_mut().zip(per_instance) {
                row.insert(spec.name.clone(), data.map_or(Value::Null, RelationData::into_value));
            }
        }
        Ok(out)
    }

    /// Flattens the loaded rows of one level, loads the next level across all
    /// of them at once and writes the results back in place.
    async fn load_nested(
        &self,
        related: &ParsedModel,
        per_instance: &mut [Option<RelationData>],
        nested: &[EagerSpec],
        cache: &mut RelationshipCache,
    ) -> Result<(), E::Error> {
        let mut flat: Vec<Item> = Vec::new();
        for data in per_instance.iter() {
            match data {
                Some(RelationData::One(item)) => flat.push(item.clone()),
                Some(RelationData::Many(items)) => flat.extend(items.iter().cloned()),
                None => {}
            }
        }
        if flat.is_empty() {
            return Ok(());
        }
        trace!(model = %related.name, rows = flat.len(), "loading nested relationships");
        let loaded = Box::pin(self.load_many(related, &flat, nested, cache)).await?;

        let mut rows = loaded.into_iter();
        for data in per_instance.iter_mut() {
            match data {
                Some(RelationData::One(item)) => {
                    if let Some(row) = rows.next() {
                        *item = row;
                    }
                }
                Some(RelationData::Many(items)) => {
                    for item in items.iter_mut() {
                        if let Some(row) = rows.next() {
                            *item = row;
                        }
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    async fn prefetch(
        &self,
        model: &ParsedModel,
        instances: &[Item],
        rel: &Relationship,
        cache: &mut RelationshipCache,
        missing: &mut FxHashSet<String>,
    ) -> Result<(), E::Error> {
        let Some(related) = self.resolver.resolvable_target(rel) else {
            return Ok(());
        };
        match rel.kind {
            RelationKind::BelongsTo => {
                self.prefetch_owners(model, related, instances, rel, cache, missing)
                    .await
            }
            RelationKind::HasMany => self.prefetch_children(model, related, instances, rel, cache).await,
            RelationKind::HasOne | RelationKind::BelongsToMany => Ok(()),
        }
    }

    /// Null owners are not cached, so the ones the batch get did not return
    /// go into `missing` instead.
    async fn prefetch_owners(
        &self,
        model: &ParsedModel,
        related: &ParsedModel,
        instances: &[Item],
        rel: &Relationship,
        cache: &mut RelationshipCache,
        missing: &mut FxHashSet<String>,
    ) -> Result<(), E::Error> {
        let mut pending: Vec<(String, ItemKey)> = Vec::new();
        let mut keys: Vec<ItemKey> = Vec::new();
        for instance in instances {
            let Some(id) = instance_key(model, instance) else {
                continue;
            };
            let memo_key = cache_key(&model.name, &id, &rel.name);
            if cache.contains(&memo_key) {
                continue;
            }
            let Some(fk) = instance.get(&rel.foreign_key).filter(|v| is_truthy(v)).and_then(key_string) else {
                continue;
            };
            let key = self.resolver.owner_key(related, &fk);
            if !keys.contains(&key) {
                keys.push(key.clone());
            }
            pending.push((memo_key, key));
        }
        if keys.is_empty() {
            return Ok(());
        }

        let layout = &self.resolver.registry().layout;
        debug!(
            model = %model.name,
            relationship = %rel.name,
            keys = keys.len(),
            "prefetching owners with one batch get"
        );
        let owners = self.resolver.executor().batch_get(&layout.table_name, &keys).await?;
        let mut by_partition: FxHashMap<String, Item> = FxHashMap::default();
        for owner in owners {
            if let Some(pk) = owner.get(&layout.partition_key_attribute).and_then(Value::as_str) {
                by_partition.insert(pk.to_owned(), owner);
            }
        }
        for (memo_key, key) in pending {
            match by_partition.get(&key.partition_key) {
                Some(owner) => cache.insert(memo_key, RelationData::One(owner.clone())),
                None => {
                    trace!(key = %memo_key, "owner not found");
                    missing.insert(memo_key);
                }
            }
        }
        Ok(())
    }

    async fn prefetch_children(
        &self,
        model: &ParsedModel,
        related: &ParsedModel,
        instances: &[Item],
        rel: &Relationship,
        cache: &mut RelationshipCache,
    ) -> Result<(), E::Error> {
        let mut pending: Vec<String> = Vec::new();
        let mut queries = Vec::new();
        for instance in instances {
            let Some(id) = instance_key(model, instance) else {
                continue;
            };
            let memo_key = cache_key(&model.name, &id, &rel.name);
            if cache.contains(&memo_key) || pending.contains(&memo_key) {
                continue;
            }
            queries.push(self.resolver.children_query(model, related, rel, &id));
            pending.push(memo_key);
        }
        if queries.is_empty() {
            return Ok(());
        }

        let table = &self.resolver.registry().layout.table_name;
        let executor = self.resolver.executor();
        debug!(
            model = %model.name,
            relationship = %rel.name,
            queries = queries.len(),
            "prefetching children concurrently"
        );
        let results = try_join_all(queries.iter().map(|query| executor.range_query(table, query))).await?;
        for (memo_key, rows) in pending.into_iter().zip(results) {
            cache.insert(memo_key, RelationData::Many(rows));
        }
        Ok(())
    }
}
