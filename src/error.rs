use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by configuration loading and declaration decoding.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the crate's I/O and decoding edges.
///
/// Compilation itself never returns these: a declaration that fails to decode
/// is turned into a registry warning by the builder.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A TOML document could not be decoded.
    #[error("TOML decode error: {0}")]
    Toml(#[from] toml::de::Error),
    /// A JSON document could not be decoded.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
    /// A declaration file has an extension the builder does not understand.
    #[error("unsupported declaration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    /// A decoded declaration violates a structural rule.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn invalid_declaration(msg: impl Into<String>) -> Self {
        Error::InvalidDeclaration(msg.into())
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
