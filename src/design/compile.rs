//! End-to-end compilation: declarations in, finished registry out.

use std::hash::Hasher;

use tracing::{info, warn};
use xxhash_rust::xxh64::Xxh64;

use crate::config::Config;
use crate::design::access::generate_access_patterns;
use crate::design::optimizer::assign_indexes;
use crate::schema::cache::RegistryCache;
use crate::schema::registry::{Registry, RegistryBuilder};
use crate::schema::source::DeclarationSource;

const FINGERPRINT_SEED: u64 = 0x756e_6974_6162_6c65;

/// Compiles a declaration source into a registry.
///
/// Synchronous, deterministic for a given source and configuration, and never
/// fails: problems are recorded as registry warnings. Validator errors are
/// logged; call [`Registry::validate`] to inspect them.
pub fn compile(source: &DeclarationSource, config: &Config) -> Registry {
    let mut registry = RegistryBuilder::new(config).build(source);
    assign_indexes(&mut registry, config);
    generate_access_patterns(&mut registry);
    registry.fingerprint = fingerprint(&registry);

    let report = registry.validate();
    for error in &report.errors {
        warn!(code = error.code(), "{error}");
    }
    info!(
        models = registry.models.len(),
        indexes = registry.indexes.len(),
        patterns = registry.access_patterns.len(),
        warnings = registry.warnings.len(),
        fingerprint = %format!("{:016x}", registry.fingerprint),
        "compiled single-table design"
    );
    registry
}

/// Compiles the configured discovery directory.
///
/// Without a `discovery_path` the result is an empty registry carrying one
/// warning, like any other unreadable source.
pub fn compile_configured(config: &Config) -> Registry {
    let source = DeclarationSource::Directory(config.discovery_path.clone().unwrap_or_default());
    compile(&source, config)
}

/// Returns the cached registry or compiles a fresh one.
pub fn compile_cached(
    cache: &mut RegistryCache,
    source: &DeclarationSource,
    config: &Config,
) -> std::sync::Arc<Registry> {
    cache.get_or_build(|| compile(source, config))
}

/// Hash of the index assignment table and index definitions.
///
/// Two compilations with equal fingerprints produce the same physical index
/// layout.
pub fn fingerprint(registry: &Registry) -> u64 {
    let mut hasher = Xxh64::new(FINGERPRINT_SEED);
    for (key, index) in &registry.index_assignments {
        hasher.write(key.as_bytes());
        hasher.write_u8(0);
        hasher.write_u8(*index);
    }
    for def in &registry.indexes {
        hasher.write_u8(def.number);
        for part in [&def.name, &def.partition_key, &def.sort_key] {
            hasher.write(part.as_bytes());
            hasher.write_u8(0);
        }
    }
    hasher.finish()
}
