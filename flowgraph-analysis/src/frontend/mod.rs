//! Source front end.
//!
//! The external parser is tree-sitter; this module is the only place
//! that touches it. It normalizes a parsed compilation unit into the
//! crate's own syntax tree ([`crate::ast`]), which everything
//! downstream consumes.

pub mod java;

pub use java::JavaFrontend;
