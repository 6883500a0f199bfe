//! texclean: rewrite LaTeX document trees for DocBook output
//!
//! Layers, innermost first:
//! - `domain`: document tree, tags, classification, MathML import, XML interchange
//! - `application`: the tree cleaner service
//! - `infrastructure`: filesystem, external math translator, service wiring
//! - `cli`: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
