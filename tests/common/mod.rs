//! Shared fixtures for researchgraph integration tests
//!
//! Builds in-memory graphs and small harvests from several source systems.

#![allow(dead_code)]

pub mod harvest;

pub use harvest::{person_fact, Harvest};

use researchgraph::{
    Category, MergePolicy, MergeSettings, NeighborFilter, NodeKey, ResearchGraphApi,
};

/// Fresh in-memory graph under the given policy with the default allow-list
pub fn api(policy: MergePolicy) -> ResearchGraphApi {
    ResearchGraphApi::in_memory(MergeSettings::new(policy)).unwrap()
}

/// Key of an identifier, computed the way the merge engine does
pub fn key(name: &str, value: &str) -> NodeKey {
    NodeKey::compute(name, value).unwrap()
}

/// Person-root keys adjacent to `key`
pub fn root_edges(api: &ResearchGraphApi, key: &NodeKey) -> Vec<NodeKey> {
    api.neighbors(key, &NeighborFilter::new().want_category(Category::PersonRoot))
        .unwrap()
        .map(|n| n.key)
        .collect()
}
