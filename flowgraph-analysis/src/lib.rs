//! flowgraph-analysis: per-method dataflow graph construction for
//! class-based, statically-typed OO source.
//!
//! Pipeline, leaves first:
//! - `ast`: the normalized syntax tree the engine consumes
//! - `frontend`: tree-sitter Java → `ast` (the only parser-facing code)
//! - `scopes`: storage-location refs and lexical scope trees
//! - `klass`: lazy cycle-tolerant class table, overload/override
//!   resolution, generics
//! - `frames`: first pass — per-construct read/write sets, exit routing
//! - `graph`: second pass — nodes, labeled edges, joins, loop quads
//! - `summary`: per-method output records
//! - `analyzer`: the driver tying the passes together
//!
//! Analysis is single-threaded; one method's passes complete before the
//! next begins. The klass table is the only state shared across
//! methods.

pub mod analyzer;
pub mod ast;
pub mod frames;
pub mod frontend;
pub mod graph;
pub mod klass;
pub mod scopes;
pub mod summary;

pub use analyzer::Analyzer;
pub use frontend::JavaFrontend;
pub use graph::{EdgeLabel, Graph, NodeKind};
pub use klass::{KlassTable, MethodId};
pub use scopes::{Ref, RefKind};
pub use summary::MethodSummary;
