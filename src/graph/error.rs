//! Errors raised by the merge and identity-resolution core

use super::key::{InvalidKeyError, NodeKey};
use super::node::Category;
use crate::identity::PersonRootConflict;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur in graph operations
#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed identifying fields (caller error)
    #[error("invalid key: {0}")]
    InvalidKey(#[from] InvalidKeyError),

    /// A low-level create collided with an existing node
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Strict policy: the fact's category differs from the stored one
    #[error("category conflict on {key}: stored {stored}, incoming {incoming}")]
    CategoryConflict {
        key: NodeKey,
        stored: Category,
        incoming: Category,
    },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Two identifiers already hang off different person-roots
    #[error("{0}")]
    PersonRootConflict(PersonRootConflict),

    #[error("node {0} is not personally identifying")]
    NotPersonIdentifying(NodeKey),

    /// A node was asked to co-refer with itself
    #[error("cannot link node {0} to itself")]
    SelfLink(NodeKey),

    #[error("person-root {0} cannot be connected to another person-root")]
    RootToRoot(NodeKey),

    /// Harvested facts may not claim the synthetic person-root category
    #[error("category {0} is reserved for synthetic nodes")]
    ReservedCategory(Category),

    /// Backing-store failure, propagated unchanged
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for GraphError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateKey(key) => Self::DuplicateKey(key),
            StorageError::NodeNotFound(key) => Self::NodeNotFound(key),
            other => Self::Storage(other),
        }
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
