//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::TranslatorError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("math translation failed for {latex:?}")]
    Translation {
        latex: String,
        #[source]
        source: TranslatorError,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    /// Failures confined to a single math node; the cleaner falls back to a
    /// plain phrase for those and keeps going.
    pub fn is_local_to_math(&self) -> bool {
        match self {
            Self::Translation { source, .. } => !source.is_configuration(),
            Self::Domain(DomainError::InvalidFormula { .. } | DomainError::MissingSource(_)) => {
                true
            }
            _ => false,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
