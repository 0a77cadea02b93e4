#![forbid(unsafe_code)]

//! Single-table design compilation.
//!
//! Takes the registry skeleton produced by [`crate::schema`], allocates
//! secondary indexes, generates the access pattern catalogue and checks the
//! result against the storage engine's limits.

/// Access pattern catalogue generation.
pub mod access;

/// Compilation pipeline and design fingerprint.
pub mod compile;

/// Registry comparison for migration planning.
pub mod diff;

/// Index slot allocation.
pub mod optimizer;

/// Engine limit checks.
pub mod validate;

pub use compile::{compile, compile_cached, compile_configured};
pub use diff::{diff, AssignmentChange, DesignDiff};
pub use optimizer::{IndexDefinition, IndexUsage, LoadEstimate, MAX_PATTERNS_PER_INDEX};
pub use validate::{validate_indexes, DesignError, ValidationReport};
