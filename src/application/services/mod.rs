//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, MathTranslator)
//! but are themselves concrete structs, not traits.

mod cleaner;

pub use cleaner::{CleanReport, CleanerService, Pass, Rule, LABEL_ATTR};
