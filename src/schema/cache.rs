//! Time-boxed cache for compiled registries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Config;
use crate::schema::registry::Registry;

struct CachedRegistry {
    built_at: Instant,
    registry: Arc<Registry>,
}

/// Holds the last compiled registry for a bounded time.
///
/// Methods take `&mut self`; when several tasks share one cache the caller
/// serialises rebuilds (e.g. behind a mutex or single-flight guard).
pub struct RegistryCache {
    ttl: Duration,
    entry: Option<CachedRegistry>,
}

impl RegistryCache {
    /// Creates an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// Creates an empty cache using the configured lifetime.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.registry_ttl())
    }

    /// Cache lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached registry when it is still fresh.
    pub fn get(&self) -> Option<Arc<Registry>> {
        self.get_at(Instant::now())
    }

    /// [`RegistryCache::get`] against an explicit clock reading.
    pub fn get_at(&self, now: Instant) -> Option<Arc<Registry>> {
        self.entry
            .as_ref()
            .filter(|entry| now.saturating_duration_since(entry.built_at) < self.ttl)
            .map(|entry| Arc::clone(&entry.registry))
    }

    /// Returns the cached registry, rebuilding it when missing or expired.
    pub fn get_or_build<F>(&mut self, build: F) -> Arc<Registry>
    where
        F: FnOnce() -> Registry,
    {
        self.get_or_build_at(Instant::now(), build)
    }

    /// [`RegistryCache::get_or_build`] against an explicit clock reading.
    pub fn get_or_build_at<F>(&mut self, now: Instant, build: F) -> Arc<Registry>
    where
        F: FnOnce() -> Registry,
    {
        if let Some(registry) = self.get_at(now) {
            return registry;
        }
        debug!(ttl_secs = self.ttl.as_secs(), "rebuilding registry");
        let registry = Arc::new(build());
        self.entry = Some(CachedRegistry {
            built_at: now,
            registry: Arc::clone(&registry),
        });
        registry
    }

    /// Drops the cached registry.
    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            debug!("registry cache invalidated");
        }
    }
}
