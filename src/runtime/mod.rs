#![forbid(unsafe_code)]

//! Relationship resolution at request time.
//!
//! The compiled [`Registry`](crate::schema::Registry) says where related rows
//! live; a caller-supplied [`QueryExecutor`] fetches them. Nothing here holds
//! state across requests except what the caller passes in.

/// Request-scoped relationship cache.
pub mod cache;

/// Eager loading with batched prefetch.
pub mod eager;

/// Executor contract and query descriptions.
pub mod executor;

/// In-memory executor.
pub mod memory;

/// Single relationship resolution.
pub mod resolver;

pub use cache::{RelationData, RelationshipCache};
pub use eager::{EagerLoader, EagerSpec};
pub use executor::{Item, ItemKey, KeyCondition, QueryExecutor, RangeQuery, SortCondition};
pub use memory::{CallStats, MemoryError, MemoryExecutor};
pub use resolver::{resolve_relationship, RelationResult, Resolver};
