//! researchgraph: identity-resolving merge engine for research metadata
//!
//! Harvesters submit facts ("this source says entity X has name N, value V,
//! category C") one at a time. The merge engine folds each fact into a
//! property graph keyed by a deterministic hash of `(name, value)`, records
//! provenance on every merge, and keeps one synthetic person-root per cluster
//! of identifiers that denote the same physical person.
//!
//! # Core Concepts
//!
//! - **Nodes**: one identifier or metadata value, keyed by `(name, value)`
//! - **Edges**: undirected, at most one per pair of nodes
//! - **Person-roots**: synthetic anchors joining a person's identifiers
//! - **Merge policies**: `strict` rejects category conflicts and unlisted
//!   properties, `lenient` keeps them
//!
//! # Example
//!
//! ```
//! use researchgraph::{Category, Fact, MergeSettings, ResearchGraphApi};
//!
//! let api = ResearchGraphApi::in_memory(MergeSettings::default()).unwrap();
//! let report = api
//!     .merge(&Fact::new("ORCID", Category::Person, "0000-0001-9510-0802", "SysA"))
//!     .unwrap();
//! assert!(report.created);
//! ```

pub mod api;
pub mod config;
mod graph;
pub mod identity;
pub mod merge;
pub mod query;
pub mod storage;

pub use api::{ImportRejection, ImportSummary, ResearchGraphApi};
pub use config::{Config, ConfigError};
pub use graph::{
    normalize, Category, Edge, GraphError, GraphHandle, GraphResult, HistoryEvent, HistoryKind,
    HistoryTracker, InvalidKeyError, Node, NodeKey, Properties, PropertyName, PERSON_ROOT_NAME,
};
pub use identity::{
    ConsistencyChecker, PersonRootAggregator, PersonRootConflict, PersonRootOutcome, Violation,
};
pub use merge::{Fact, MergeEngine, MergePolicy, MergeReport, MergeSettings};
pub use query::{EnrichedFact, EnrichmentComparator, EnrichmentResult};
pub use storage::{
    GraphCounts, NeighborFilter, Neighbors, NodeFilter, NodeStore, OpenStore, SqliteStore,
    StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
