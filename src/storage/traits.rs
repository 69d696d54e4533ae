//! Storage trait definitions

use crate::graph::{normalize, Category, Edge, Node, NodeKey};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Node already exists: {0}")]
    DuplicateKey(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge would connect {0} to itself")]
    SelfLoop(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Filter criteria for scanning nodes
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Only nodes of this category
    pub category: Option<Category>,
    /// Only nodes with this name (case-insensitive)
    pub name: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Include/exclude filters for neighbor lookups
///
/// Empty include lists match everything. Names are compared in normalized
/// form, the same way keys are computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborFilter {
    pub name_want: Vec<String>,
    pub name_dontwant: Vec<String>,
    pub category_want: Vec<Category>,
    pub category_dontwant: Vec<Category>,
    /// Maximum number of neighbors returned
    pub max_items: Option<usize>,
}

impl NeighborFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn want_name(mut self, name: impl Into<String>) -> Self {
        self.name_want.push(name.into());
        self
    }

    pub fn exclude_name(mut self, name: impl Into<String>) -> Self {
        self.name_dontwant.push(name.into());
        self
    }

    pub fn want_category(mut self, category: Category) -> Self {
        self.category_want.push(category);
        self
    }

    pub fn exclude_category(mut self, category: Category) -> Self {
        self.category_dontwant.push(category);
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Whether a node passes the filter (ignores `max_items`)
    pub fn matches(&self, node: &Node) -> bool {
        let name = normalize(&node.name);
        if !self.name_want.is_empty() && !self.name_want.iter().any(|n| normalize(n) == name) {
            return false;
        }
        if self.name_dontwant.iter().any(|n| normalize(n) == name) {
            return false;
        }
        if !self.category_want.is_empty() && !self.category_want.contains(&node.category) {
            return false;
        }
        !self.category_dontwant.contains(&node.category)
    }
}

/// One-shot sequence of neighbor nodes, ordered by key
///
/// Each `NodeStore::neighbors` call re-executes the lookup; a `Neighbors`
/// value cannot be rewound.
#[derive(Debug)]
pub struct Neighbors {
    inner: std::vec::IntoIter<Node>,
}

impl Neighbors {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            inner: nodes.into_iter(),
        }
    }
}

impl Iterator for Neighbors {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Neighbors {}

/// Node and edge totals
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub edges: usize,
    /// Node count per category name
    pub per_category: BTreeMap<String, usize>,
}

/// Trait for node storage backends
///
/// Implementations must be thread-safe (Send + Sync) so a reader can query
/// while the single writer merges. Every mutating call is atomic and
/// visible to subsequent reads once it returns.
pub trait NodeStore: Send + Sync {
    // === Node Operations ===

    /// Load a node by key
    fn find_node(&self, key: &NodeKey) -> StorageResult<Option<Node>>;

    /// Insert a new node. Fails with `DuplicateKey` if the key exists.
    fn create_node(&self, node: &Node) -> StorageResult<()>;

    /// Insert a new node together with edges to existing nodes, all or nothing
    fn create_node_with_edges(&self, node: &Node, edges: &[Edge]) -> StorageResult<()>;

    /// Replace the stored record of an existing node. Fails with `NodeNotFound`.
    fn update_node(&self, node: &Node) -> StorageResult<()>;

    /// Delete a node and its edges. Returns false if it did not exist.
    fn delete_node(&self, key: &NodeKey) -> StorageResult<bool>;

    /// Scan nodes matching filter criteria, ordered by key
    fn find_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>>;

    // === Edge Operations ===

    /// Add an edge. Returns false (and changes nothing) if it already exists.
    fn connect(&self, edge: &Edge) -> StorageResult<bool>;

    /// Check whether two nodes are connected (in either direction)
    fn has_edge(&self, a: &NodeKey, b: &NodeKey) -> StorageResult<bool>;

    /// All edges touching a node
    fn edges_of(&self, key: &NodeKey) -> StorageResult<Vec<Edge>>;

    /// Nodes adjacent to `key` that pass `filter`, ordered by key
    fn neighbors(&self, key: &NodeKey, filter: &NeighborFilter) -> StorageResult<Neighbors>;

    // === Bulk Operations ===

    fn counts(&self) -> StorageResult<GraphCounts>;

    /// Delete every node and edge
    fn delete_all(&self) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: NodeStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
