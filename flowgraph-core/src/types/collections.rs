//! Collection aliases for hot paths.
//!
//! FxHash is a non-cryptographic hash that is measurably faster than
//! SipHash for the short string and integer keys this engine uses.

pub use rustc_hash::{FxHashMap, FxHashSet};
