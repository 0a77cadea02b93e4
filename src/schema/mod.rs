#![forbid(unsafe_code)]

//! Entity declarations and their canonical compiled form.
//!
//! Declarations are decoded strictly at the edge, attributes get a storage
//! type, relationships get their defaults and index requirements, and the
//! registry skeleton is assembled for the design stage.

/// Time-boxed registry cache.
pub mod cache;

/// Entity declarations as supplied by callers.
pub mod declaration;

/// Relationship derivation and target linking.
pub mod derive;

/// Storage type inference.
pub mod infer;

/// Parsed models, relationships, key templates and access patterns.
pub mod model;

/// Naming helpers.
pub mod naming;

/// Registry type and skeleton builder.
pub mod registry;

/// Declaration discovery.
pub mod source;

/// Compilation warnings.
pub mod warning;

pub use cache::RegistryCache;
pub use declaration::{
    AttributeDeclaration, EntityDeclaration, RelationshipGroups, RelationshipOptions,
    RelationshipStub, TraitFlags,
};
pub use infer::{infer_storage_type, StorageType};
pub use model::{
    AccessPattern, Attribute, IndexKeyTemplate, KeyPattern, Operation, ParsedModel, PatternKind,
    RelationKind, Relationship,
};
pub use registry::{Registry, RegistryBuilder, TableLayout};
pub use source::DeclarationSource;
pub use warning::{Warning, WarningKind};
