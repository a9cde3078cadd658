// Errors and diagnostics raised while generating bindings.

use std::fmt;
use std::io;

use thiserror::Error;

/// Problems with the configuration itself. Raised before any output is produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed type `{fragment}`: {reason}")]
    MalformedType { fragment: String, reason: String },

    #[error("unresolved type `{name}` in {context}")]
    UnresolvedType { name: String, context: String },

    #[error("invalid signature for `{function}`: {reason}")]
    InvalidSignature { function: String, reason: String },
}

#[derive(Debug, Error)]
pub enum GenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config extension `{0}` (expected .json or .toml)")]
    UnsupportedExtension(String),
}

pub type GenResult<T> = Result<T, GenError>;

impl GenError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        GenError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A type shape has no emission for the requested artifact.
    UnsupportedConversion,
    /// Emitted code exists but leaves some cleanup to the caller.
    PartialCleanup,
    /// A named type fell back to `void`.
    Unresolved,
}

/// Non-fatal finding recorded during generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DiagnosticKind::UnsupportedConversion => "unsupported conversion",
            DiagnosticKind::PartialCleanup => "partial cleanup",
            DiagnosticKind::Unresolved => "unresolved type",
        };
        write!(f, "{kind}: {}", self.message)
    }
}
