//! Error and warning types
//!
//! Nothing in extraction is fatal. Every extraction step returns an
//! [`Extraction`] carrying its primary value plus the warnings it produced;
//! callers fold these together with [`Extraction::absorb`]. Only failures of
//! the environment itself (writing output, loading an explicitly requested
//! config) surface as [`ModgraphError`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Irrecoverable errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ModgraphError {
    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ModgraphResult<T> = Result<T, ModgraphError>;

/// Category of a non-fatal problem found during extraction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A declaration or source file could not be parsed at all.
    #[error("parse failure")]
    ParseFailure,
    /// A file parsed but a record in it is missing required fields.
    #[error("invalid declaration")]
    InvalidDeclaration,
    /// A required input (scan root, plugin source, ...) does not exist.
    #[error("missing input")]
    MissingInput,
    /// An auxiliary signal (change history) could not be gathered.
    #[error("signal unavailable")]
    SignalUnavailable,
}

/// A non-fatal problem tied to the file that caused it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Source locator (path relative to the scan root) when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, file: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file,
            message: message.into(),
        }
    }

    pub fn parse_failure(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::ParseFailure, Some(file.into()), message)
    }

    pub fn invalid_declaration(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::InvalidDeclaration, Some(file.into()), message)
    }

    pub fn missing_input(file: Option<String>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::MissingInput, file, message)
    }

    pub fn signal_unavailable(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SignalUnavailable, None, message)
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} in {}: {}", self.kind, file, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Primary result plus the ordered warnings produced while computing it.
#[derive(Debug, Clone, Default)]
pub struct Extraction<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Extraction<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        tracing::debug!("{}", warning);
        self.warnings.push(warning);
    }

    /// Move another extraction's warnings into this one and hand back its value.
    pub fn absorb<U>(&mut self, other: Extraction<U>) -> U {
        self.warnings.extend(other.warnings);
        other.value
    }

    pub fn into_parts(self) -> (T, Vec<Warning>) {
        (self.value, self.warnings)
    }
}
