//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::tree::NodeId;

/// Domain errors represent tree invariant violations and malformed data.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("child {child:?} not found among the children of {parent:?}")]
    ChildNotFound { parent: NodeId, child: NodeId },

    #[error("node has no parent: {0:?}")]
    Detached(NodeId),

    #[error("cycle detected when attaching node: {0:?}")]
    CycleDetected(NodeId),

    #[error("the document root cannot be removed")]
    RootRemoval,

    #[error("math node has no source text: {0}")]
    MissingSource(String),

    #[error("invalid document xml: {message}")]
    InvalidXml { message: String },

    #[error("invalid formula: {message}")]
    InvalidFormula { message: String },
}

/// Result type for tree operations.
pub type DomainResult<T> = Result<T, DomainError>;
