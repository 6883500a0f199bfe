//! Domain layer: document tree and pure tree logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod classifier;
pub mod error;
pub mod label;
pub mod mathml;
pub mod tag;
pub mod tree;
pub mod xml;

pub use classifier::is_simple;
pub use error::{DomainError, DomainResult};
pub use label::sanitize_label;
pub use mathml::{import_formula, MATHML_NS};
pub use tag::Tag;
pub use tree::{Document, Node, NodeId, NodeKind};
pub use xml::{has_mathml, parse_document, write_document};
