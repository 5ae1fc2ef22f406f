//! sparsecube Store - Sparse N-dimensional dataset container
//!
//! This crate implements the in-memory dataset model:
//! - Data objects holding a scalar or dense block at a coordinate tuple
//! - Typed metadata records shared by any number of objects
//! - Per-axis inverted index for positional and value-based queries
//! - Reduction, copy-on-write removal and in-order aggregation
//! - Dense materialisation of the whole structure
//! - A lock-protected handle for use across threads

pub mod axes;
pub mod block;
pub mod cache;
pub mod metadata;
pub mod object;
pub mod shared;
pub mod structure;

// Re-exports
pub use axes::{Axes, Equivalence};
pub use block::Block;
pub use cache::{CacheStats, SliceCache};
pub use metadata::{Field, Kind, Metadata, Value};
pub use object::{DataObject, SubAxisValues};
pub use shared::{OwnedSelection, SharedDataStructure};
pub use structure::{DataStructure, Selection};
