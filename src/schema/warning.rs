use std::fmt;

use serde::Serialize;

/// Category of a non-fatal compilation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The declaration source could not be enumerated.
    DiscoveryFailed,
    /// A declaration failed to decode or violated a structural rule.
    InvalidDeclaration,
    /// Two declarations share a name or entity type.
    DuplicateEntity,
    /// A relationship names an entity that is not declared.
    UnknownRelatedModel,
    /// The index pool is exhausted; the lookup falls back to a scan.
    IndexPoolExhausted,
}

/// A non-fatal finding recorded on the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Finding category.
    pub kind: WarningKind,
    /// Entity, relationship or path the finding is about.
    pub subject: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Warning {
    pub(crate) fn new(
        kind: WarningKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}
