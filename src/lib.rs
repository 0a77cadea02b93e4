//! Single-table key-value design compiler and relationship runtime.
//!
//! Entity declarations go in; a [`Registry`] comes out describing how every
//! entity maps onto one physical table: key templates, secondary index
//! assignments, the access patterns the layout supports and any warnings
//! raised on the way. The [`runtime`] module then resolves relationships
//! against that registry through a caller-supplied executor, batching
//! lookups across siblings to avoid N+1 round trips.
//!
//! ```no_run
//! use unitable::{compile, Config, DeclarationSource, EntityDeclaration};
//!
//! let source = DeclarationSource::Inline(vec![
//!     EntityDeclaration::new("User").has_many("Post"),
//!     EntityDeclaration::new("Post").belongs_to("User"),
//! ]);
//! let registry = compile(&source, &Config::default());
//! assert!(registry.validate().success);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod design;
pub mod error;
pub mod runtime;
pub mod schema;

pub use config::{ConsolidationCheck, Config, IndexOverride};
pub use design::{compile, compile_cached, compile_configured, DesignError, ValidationReport};
pub use error::{Error, Result};
pub use runtime::{EagerLoader, EagerSpec, QueryExecutor, RelationshipCache, Resolver};
pub use schema::{DeclarationSource, EntityDeclaration, ParsedModel, Registry, RegistryCache};
