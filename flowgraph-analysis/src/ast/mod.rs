//! Normalized syntax tree.
//!
//! The engine never touches tree-sitter directly; the front end
//! normalizes a parsed compilation unit into these types and everything
//! downstream consumes them. The construct set is closed: anything the
//! front end cannot express becomes an `Unsupported` marker, which the
//! analysis reports as `UnsupportedConstruct` for that method only.

pub mod types;

pub use types::{
    CatchClause, CompilationUnit, Expr, ExprKind, FieldDecl, LambdaBody, LiteralKind, MethodDecl,
    NodeId, NodeIdGen, ParamDecl, Stmt, StmtKind, SwitchCase, TypeDecl, TypeKind, TypeName,
};
