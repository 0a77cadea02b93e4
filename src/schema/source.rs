//! Where entity declarations come from.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::schema::declaration::EntityDeclaration;

/// A set of entity declarations to compile.
#[derive(Debug, Clone)]
pub enum DeclarationSource {
    /// Every `*.json` / `*.toml` file directly inside a directory.
    Directory(PathBuf),
    /// Declarations supplied in memory.
    Inline(Vec<EntityDeclaration>),
}

/// Outcome of enumerating a source.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Declarations that decoded and passed structural checks.
    pub declarations: Vec<EntityDeclaration>,
    /// Entries that were skipped, with the reason.
    pub rejected: Vec<(String, Error)>,
}

impl DeclarationSource {
    /// Enumerates the source.
    ///
    /// Only a failure to enumerate at all is an `Err`; individual bad entries
    /// land in [`Discovered::rejected`].
    pub fn discover(&self) -> Result<Discovered> {
        match self {
            DeclarationSource::Inline(decls) => {
                let mut out = Discovered::default();
                for decl in decls {
                    match decl.check() {
                        Ok(()) => out.declarations.push(decl.clone()),
                        Err(err) => out.rejected.push((decl.name.clone(), err)),
                    }
                }
                Ok(out)
            }
            DeclarationSource::Directory(dir) => discover_dir(dir),
        }
    }
}

impl From<Vec<EntityDeclaration>> for DeclarationSource {
    fn from(decls: Vec<EntityDeclaration>) -> Self {
        DeclarationSource::Inline(decls)
    }
}

fn discover_dir(dir: &Path) -> Result<Discovered> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let known = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("json" | "toml")
        );
        if path.is_file() && known {
            files.push(path);
        } else {
            trace!(path = %path.display(), "skipping non-declaration entry");
        }
    }
    // read_dir order is platform dependent.
    files.sort();
    debug!(dir = %dir.display(), files = files.len(), "discovered declaration files");

    let mut out = Discovered::default();
    for path in files {
        match EntityDeclaration::from_path(&path) {
            Ok(decl) => out.declarations.push(decl),
            Err(err) => out.rejected.push((path.display().to_string(), err)),
        }
    }
    Ok(out)
}
