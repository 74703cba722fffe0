//! Frame model — the lexical-nesting tree that tracks per-construct
//! read/write effects and routes non-local exits.
//!
//! The tree is built in a single top-down pass over a method body
//! ([`builder::FrameBuilder`]); the graph pass then consults it to know
//! which refs cross construct boundaries and where exits land.

pub mod builder;
pub mod types;

pub use builder::{FrameBuilder, FramePass};
pub use types::{Frame, FrameId, FrameLabel, FrameTree, Resolutions};
