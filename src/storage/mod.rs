//! Storage backends for the research graph
//!
//! Every component reaches persistence through the `NodeStore` trait.
//! The shipped implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    GraphCounts, NeighborFilter, Neighbors, NodeFilter, NodeStore, OpenStore, StorageError,
    StorageResult,
};
