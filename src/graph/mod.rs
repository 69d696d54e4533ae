//! Core graph data structures

mod edge;
mod error;
mod handle;
mod history;
mod key;
mod node;


pub use edge::Edge;
pub use error::{GraphError, GraphResult};
pub use handle::GraphHandle;
pub use history::{HistoryEvent, HistoryKind, HistoryTracker};
pub use key::{normalize, InvalidKeyError, NodeKey};
pub use node::{Category, Node, Properties, PropertyName, PERSON_ROOT_NAME};
