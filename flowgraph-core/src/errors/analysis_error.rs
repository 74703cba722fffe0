//! Analysis errors and non-fatal error collection.

use crate::types::Span;

use super::{ConfigError, ParseError, ResolveError};

/// Errors that abort analysis of a single method.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A syntax construct outside the modeled set. Aborts the current
    /// method only.
    #[error("unsupported construct: {kind}{}", span_suffix(.span))]
    UnsupportedConstruct { kind: String, span: Option<Span> },

    /// A per-method failure tagged with the method's signature.
    #[error("analysis of {signature} failed: {source}")]
    Method {
        signature: String,
        #[source]
        source: Box<AnalysisError>,
    },

    #[error("analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    pub fn unsupported(kind: impl Into<String>, span: Option<Span>) -> Self {
        Self::UnsupportedConstruct {
            kind: kind.into(),
            span,
        }
    }

    /// Wrap an error with the signature of the method it aborted.
    pub fn in_method(self, signature: impl Into<String>) -> Self {
        Self::Method {
            signature: signature.into(),
            source: Box::new(self),
        }
    }
}

fn span_suffix(span: &Option<Span>) -> String {
    match span {
        Some(s) => format!(" at {s}"),
        None => String::new(),
    }
}

/// Result of a run that accumulates non-fatal errors.
/// Allows partial results to be returned even when some methods fail.
#[derive(Debug, Default)]
pub struct AnalysisReport<T: Default = ()> {
    /// The successful result data.
    pub data: T,
    /// Non-fatal errors collected during the run.
    pub errors: Vec<AnalysisError>,
}

impl<T: Default> AnalysisReport<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// Record a non-fatal error.
    pub fn add_error(&mut self, error: AnalysisError) {
        self.errors.push(error);
    }

    /// Returns true if no non-fatal errors were recorded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_wrapping_keeps_signature() {
        let err = AnalysisError::unsupported("goto", None).in_method("A.run()V");
        let text = err.to_string();
        assert!(text.contains("A.run()V"));
    }

    #[test]
    fn test_report_accumulates() {
        let mut report: AnalysisReport<Vec<u32>> = AnalysisReport::new(vec![1]);
        assert!(report.is_clean());
        report.add_error(AnalysisError::Cancelled);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.data, vec![1]);
    }
}
