//! flowgraph-core: shared types, errors, config, and traits for the
//! Flowgraph dataflow analysis engine.
//!
//! No analysis logic lives here — only the vocabulary the engine crate
//! (`flowgraph-analysis`) and its hosts share:
//! - Errors: one enum per subsystem, `thiserror` only
//! - Config: TOML-loadable analysis options
//! - Types: spans and hot-path collection aliases
//! - Traits: cooperative cancellation

pub mod config;
pub mod errors;
pub mod traits;
pub mod types;

pub use config::{AnalysisConfig, UncheckedExceptionPolicy};
pub use errors::{AnalysisError, AnalysisReport, ConfigError, ParseError, ResolveError};
pub use traits::{Cancellable, CancellationToken};
pub use types::Span;
