//! Enrichment: facts the graph knows that one source system does not

use crate::graph::{Category, GraphHandle, GraphResult, Node, NodeKey, Properties};
use crate::storage::NeighborFilter;
use serde::Serialize;
use std::collections::BTreeMap;

/// A fact contributed by other source systems
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedFact {
    pub key: NodeKey,
    pub name: String,
    pub category: Category,
    pub value: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    /// Source systems that contributed the fact, ordered by name
    pub sources: Vec<String>,
}

impl From<Node> for EnrichedFact {
    fn from(node: Node) -> Self {
        let sources = node.sources().into_iter().collect();
        Self {
            key: node.key,
            name: node.name,
            category: node.category,
            value: node.value,
            properties: node.properties,
            sources,
        }
    }
}

/// Result of an enrichment comparison
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    /// Facts missing from the source system, ordered by key
    pub facts: Vec<EnrichedFact>,
    /// Matching facts before `max_items` was applied
    pub total_count: usize,
}

/// Computes what a source system could learn from the rest of the graph
///
/// The facts around a node `n` are `n` itself, its neighbors, and, through
/// any person-root neighbor, the other identifiers of the same person.
/// Person-roots carry no provenance and are never reported.
pub struct EnrichmentComparator<'a> {
    handle: &'a GraphHandle,
}

impl<'a> EnrichmentComparator<'a> {
    pub fn new(handle: &'a GraphHandle) -> Self {
        Self { handle }
    }

    /// Facts around `key` that `source` never contributed but some other source did
    ///
    /// An empty result is valid; a missing `key` is `NodeNotFound`.
    pub fn enrich(
        &self,
        key: &NodeKey,
        source: &str,
        filter: &NeighborFilter,
    ) -> GraphResult<EnrichmentResult> {
        let candidates = self.facts_around(key)?;

        let facts: Vec<EnrichedFact> = candidates
            .into_values()
            .filter(|node| filter.matches(node))
            .filter(|node| {
                let sources = node.sources();
                !sources.is_empty() && !sources.contains(source)
            })
            .map(EnrichedFact::from)
            .collect();

        let total_count = facts.len();
        let facts = match filter.max_items {
            Some(max) => facts.into_iter().take(max).collect(),
            None => facts,
        };

        tracing::debug!(%key, source, found = total_count, "enrichment comparison");
        Ok(EnrichmentResult { facts, total_count })
    }

    fn facts_around(&self, key: &NodeKey) -> GraphResult<BTreeMap<NodeKey, Node>> {
        let target = self.handle.get_node(key)?;
        let store = self.handle.store();
        let everything = NeighborFilter::new();
        let mut facts = BTreeMap::new();

        let mut visit = |node: Node| {
            if !node.is_person_root() {
                facts.entry(node.key.clone()).or_insert(node);
            }
        };

        let neighbors: Vec<Node> = store.neighbors(&target.key, &everything)?.collect();
        visit(target);
        for neighbor in neighbors {
            if neighbor.is_person_root() {
                for member in store.neighbors(&neighbor.key, &everything)? {
                    visit(member);
                }
            } else {
                visit(neighbor);
            }
        }
        Ok(facts)
    }
}
