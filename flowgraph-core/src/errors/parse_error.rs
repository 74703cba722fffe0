//! Front-end parse errors.

/// Errors from the tree-sitter front end.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("failed to load grammar: {message}")]
    Grammar { message: String },

    #[error("parser produced no tree for {unit}")]
    NoTree { unit: String },

    #[error("source contains {count} syntax error(s), first at {first}")]
    SyntaxErrors { count: u32, first: String },
}
