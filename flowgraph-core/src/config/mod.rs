//! Analysis configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How exceptions raised by arbitrary calls are modeled.
///
/// Explicit `throw` statements always produce exits; this policy only
/// governs exceptions escaping from call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UncheckedExceptionPolicy {
    /// Calls never raise exits; only explicit `throw` does.
    Ignore,
    /// A resolved call whose method declares thrown types raises an exit
    /// candidate toward the nearest enclosing catch frame.
    #[default]
    NearestTry,
}

/// Configuration for the analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Policy for exceptions escaping call sites.
    pub unchecked_exceptions: UncheckedExceptionPolicy,
    /// Run the dead-node pruning pass after graph construction.
    pub prune_dead_nodes: bool,
    /// Downgrade unresolved call sites to unknown-effect call nodes
    /// instead of aborting the method.
    pub include_unresolved_calls: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            unchecked_exceptions: UncheckedExceptionPolicy::default(),
            prune_dead_nodes: true,
            include_unresolved_calls: true,
        }
    }
}

impl AnalysisConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
