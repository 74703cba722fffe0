//! Error handling for Flowgraph.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod analysis_error;
pub mod config_error;
pub mod parse_error;
pub mod resolve_error;

pub use analysis_error::{AnalysisError, AnalysisReport};
pub use config_error::ConfigError;
pub use parse_error::ParseError;
pub use resolve_error::ResolveError;
