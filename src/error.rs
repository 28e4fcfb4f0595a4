//! Error types shared by discovery and the query layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, persisting or loading exposed symbols.
#[derive(Error, Debug)]
pub enum ExposeError {
    /// The persisted index could not be found.
    #[error("could not find exposed symbols artifact at {}", .0.display())]
    ArtifactNotFound(PathBuf),
    /// The persisted index exists but does not parse.
    #[error("malformed exposed symbols artifact {}: {source}", .path.display())]
    MalformedArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A class declared by a source file could not be loaded, even after
    /// loading the file itself.
    #[error("class {0} not found")]
    UnresolvableType(String),
    /// The class loaded but its structure could not be extracted.
    #[error("reflection of {class} failed: {reason}")]
    Reflection { class: String, reason: String },
    /// A source file could not be parsed.
    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("cyclic inheritance involving {0}")]
    CyclicInheritance(String),
    #[error("cannot redeclare {name} (already declared in {})", .previous.display())]
    DuplicateDeclaration { name: String, previous: PathBuf },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize exposed symbols: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ExposeError {
    pub(crate) fn reflection(class: &str, reason: impl Into<String>) -> Self {
        ExposeError::Reflection {
            class: class.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ExposeError> = std::result::Result<T, E>;
