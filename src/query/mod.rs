//! Read-side queries over the research graph
//!
//! Neighbor lookups go straight through `GraphHandle::neighbors` with a
//! `NeighborFilter`; enrichment compares one source system's view of a node
//! against everything else the graph knows.

mod enrich;

pub use enrich::{EnrichedFact, EnrichmentComparator, EnrichmentResult};
