use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole compliance run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The root path could not be read, so nothing could be discovered.
    #[error("cannot read test directory '{path}': {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The evaluator under test raised instead of producing a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A fixture file that could not be turned into test cases.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed fixture {}: {message}", path.display())]
pub struct MalformedFixture {
    pub path: PathBuf,
    /// Case name if one could be read, otherwise the file path.
    pub name: String,
    pub message: String,
}

/// Problems while creating or editing a fixture by hand.
#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("context is not valid JSON: {0}")]
    InvalidContext(#[source] serde_json::Error),

    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("editor '{editor}' failed: {reason}")]
    Editor { editor: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
