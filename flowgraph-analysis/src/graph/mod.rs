//! Per-method dataflow graph: node/edge types, the component threaded
//! through construction, and the builder itself.

pub mod builder;
pub mod component;
pub mod types;

pub use builder::GraphBuilder;
pub use component::{Component, Exit};
pub use types::{EdgeLabel, Graph, NodeData, NodeKind};
