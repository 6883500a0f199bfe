//! Infrastructure-level errors (wraps application errors)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::application::ApplicationError;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Translator(#[from] TranslatorError),
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Failures of the external math translator.
#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("translator executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("cannot start translator {executable}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("translator I/O failed")]
    Io(#[from] std::io::Error),

    #[error("translator produced no output for {0:?}")]
    Timeout(Duration),

    #[error("translator reported {count} errors, last: {last}")]
    TooManyErrors { count: usize, last: String },

    #[error("translator output ended before a formula was produced")]
    StreamClosed,
}

impl TranslatorError {
    /// Configuration problems abort the whole run.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ExecutableNotFound(_) | Self::Spawn { .. })
    }
}
