//! GraphHandle: the explicit entry point every operation runs against

use super::edge::Edge;
use super::error::{GraphError, GraphResult};
use super::key::NodeKey;
use super::node::{Node, PropertyName};
use crate::identity::PersonRootConflict;
use crate::merge::{MergePolicy, MergeSettings};
use crate::storage::{GraphCounts, NeighborFilter, Neighbors, NodeStore};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;

/// Owns the connection to the backing store and the merge settings chosen
/// at startup
///
/// Cheap to share behind an `Arc`. Components borrow it for the duration of
/// a call; nothing holds node references across calls, only keys.
pub struct GraphHandle {
    store: Arc<dyn NodeStore>,
    settings: MergeSettings,
    /// Property names strict merges admit. Seeded from the settings and
    /// extended by every name a lenient merge stores.
    allowed_properties: DashSet<PropertyName>,
    /// Person-root conflicts seen by this handle, keyed by the ordered pair
    /// of identifiers that triggered them
    conflicts: DashMap<(NodeKey, NodeKey), PersonRootConflict>,
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHandle")
            .field("settings", &self.settings)
            .field("allowed_properties", &self.allowed_properties.len())
            .field("conflicts", &self.conflicts.len())
            .finish_non_exhaustive()
    }
}

impl GraphHandle {
    pub fn new(store: Arc<dyn NodeStore>, settings: MergeSettings) -> Self {
        let allowed_properties = settings.allowed_properties.iter().cloned().collect();
        Self {
            store,
            settings,
            allowed_properties,
            conflicts: DashMap::new(),
        }
    }

    /// The backing store
    pub fn store(&self) -> &dyn NodeStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    // === Property allow-list ===

    /// Whether a merge under `policy` may store property `name`
    ///
    /// Lenient admission adds the name to the allow-list, so later strict
    /// merges keep accepting it.
    pub fn admit_property(&self, name: &PropertyName, policy: MergePolicy) -> bool {
        match policy {
            MergePolicy::Strict => self.allowed_properties.contains(name),
            MergePolicy::Lenient => {
                if self.allowed_properties.insert(name.clone()) {
                    tracing::info!(property = %name, "property added to allow-list");
                }
                true
            }
        }
    }

    /// Current allow-list, sorted by name
    pub fn allowed_properties(&self) -> Vec<PropertyName> {
        let mut names: Vec<_> = self.allowed_properties.iter().map(|n| n.key().clone()).collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        names
    }

    // === Reads ===

    pub fn find_node(&self, key: &NodeKey) -> GraphResult<Option<Node>> {
        Ok(self.store.find_node(key)?)
    }

    /// Like `find_node`, but a missing key is a `NodeNotFound` error
    pub fn get_node(&self, key: &NodeKey) -> GraphResult<Node> {
        self.store
            .find_node(key)?
            .ok_or_else(|| GraphError::NodeNotFound(key.to_string()))
    }

    /// Neighbors of an existing node, ordered by key
    pub fn neighbors(&self, key: &NodeKey, filter: &NeighborFilter) -> GraphResult<Neighbors> {
        if self.store.find_node(key)?.is_none() {
            return Err(GraphError::NodeNotFound(key.to_string()));
        }
        Ok(self.store.neighbors(key, filter)?)
    }

    pub fn stats(&self) -> GraphResult<GraphCounts> {
        Ok(self.store.counts()?)
    }

    // === Writes ===

    /// Add an undirected edge. Returns false if it already existed.
    ///
    /// Refuses self-links and edges between two person-roots.
    pub fn connect(&self, a: &Node, b: &Node, source: Option<&str>) -> GraphResult<bool> {
        if a.key == b.key {
            return Err(GraphError::SelfLink(a.key.clone()));
        }
        if a.is_person_root() && b.is_person_root() {
            return Err(GraphError::RootToRoot(b.key.clone()));
        }

        let mut edge = Edge::new(a.key.clone(), b.key.clone());
        if let Some(source) = source {
            edge = edge.with_source(source);
        }
        let added = self.store.connect(&edge)?;
        if added {
            tracing::debug!(a = %a.key, b = %b.key, source = ?source, "connected nodes");
        }
        Ok(added)
    }

    /// Delete every node, edge and registered conflict, and return the
    /// allow-list to its configured names
    pub fn reset(&self) -> GraphResult<()> {
        self.store.delete_all()?;
        self.conflicts.clear();
        self.allowed_properties.clear();
        for name in &self.settings.allowed_properties {
            self.allowed_properties.insert(name.clone());
        }
        tracing::info!("graph reset");
        Ok(())
    }

    // === Conflict register ===

    /// Remember a person-root conflict. Reporting the same pair twice keeps
    /// the latest report.
    pub(crate) fn record_conflict(&self, conflict: PersonRootConflict) {
        let pair = if conflict.a <= conflict.b {
            (conflict.a.clone(), conflict.b.clone())
        } else {
            (conflict.b.clone(), conflict.a.clone())
        };
        self.conflicts.insert(pair, conflict);
    }

    /// Person-root conflicts awaiting operator resolution, ordered by the
    /// identifiers involved
    pub fn pending_conflicts(&self) -> Vec<PersonRootConflict> {
        let mut entries: Vec<_> = self
            .conflicts
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        entries.sort_by(|x, y| x.0.cmp(&y.0));
        entries.into_iter().map(|(_, c)| c).collect()
    }

    /// Forget all registered conflicts (e.g. after a report was written)
    pub fn clear_conflicts(&self) {
        self.conflicts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Category;
    use crate::storage::{OpenStore, SqliteStore};

    fn handle() -> GraphHandle {
        let store = SqliteStore::open_in_memory().unwrap();
        GraphHandle::new(Arc::new(store), MergeSettings::default())
    }

    fn stored(handle: &GraphHandle, node: Node) -> Node {
        handle.store().create_node(&node).unwrap();
        node
    }

    #[test]
    fn get_node_reports_missing_key() {
        let h = handle();
        let err = h.get_node(&NodeKey::from("orcid|missing")).unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(k) if k == "orcid|missing"));
        assert!(h.find_node(&NodeKey::from("orcid|missing")).unwrap().is_none());
    }

    #[test]
    fn neighbors_of_missing_node_is_an_error() {
        let h = handle();
        let err = h
            .neighbors(&NodeKey::from("orcid|missing"), &NeighborFilter::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(_)));
    }

    #[test]
    fn connect_rejects_self_links_and_root_pairs() {
        let h = handle();
        let person = stored(&h, Node::new("ORCID", Category::Person, "1").unwrap());
        let r1 = stored(&h, Node::new_person_root());
        let r2 = stored(&h, Node::new_person_root());

        assert!(matches!(
            h.connect(&person, &person, None).unwrap_err(),
            GraphError::SelfLink(_)
        ));
        assert!(matches!(
            h.connect(&r1, &r2, None).unwrap_err(),
            GraphError::RootToRoot(_)
        ));
        assert!(h.connect(&person, &r1, Some("SysA")).unwrap());
        assert!(!h.connect(&r1, &person, Some("SysB")).unwrap());
        assert_eq!(h.stats().unwrap().edges, 1);
    }

    #[test]
    fn conflicts_are_deduplicated_per_pair() {
        let h = handle();
        let conflict = PersonRootConflict {
            a: NodeKey::from("orcid|1"),
            b: NodeKey::from("isni|2"),
            roots: vec![NodeKey::from("person-root|x"), NodeKey::from("person-root|y")],
            source: "SysA".into(),
        };
        h.record_conflict(conflict.clone());
        h.record_conflict(PersonRootConflict {
            a: conflict.b.clone(),
            b: conflict.a.clone(),
            source: "SysB".into(),
            ..conflict.clone()
        });

        let pending = h.pending_conflicts();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source, "SysB");

        h.clear_conflicts();
        assert!(h.pending_conflicts().is_empty());
    }

    #[test]
    fn lenient_admission_grows_the_allow_list() {
        let h = handle();
        let year = PropertyName::from("year");

        assert!(!h.admit_property(&year, MergePolicy::Strict));
        assert!(h.admit_property(&year, MergePolicy::Lenient));
        assert!(h.admit_property(&year, MergePolicy::Strict));
        assert!(h.admit_property(&PropertyName::Comment, MergePolicy::Strict));

        let names: Vec<String> = h.allowed_properties().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, ["comment", "note", "url_main", "url_other", "year"]);
    }

    #[test]
    fn reset_empties_graph_and_register() {
        let h = handle();
        stored(&h, Node::new("ORCID", Category::Person, "1").unwrap());
        h.admit_property(&PropertyName::from("year"), MergePolicy::Lenient);
        h.record_conflict(PersonRootConflict {
            a: NodeKey::from("a"),
            b: NodeKey::from("b"),
            roots: vec![],
            source: "SysA".into(),
        });

        h.reset().unwrap();
        assert_eq!(h.stats().unwrap().nodes, 0);
        assert!(h.pending_conflicts().is_empty());
        assert!(!h.admit_property(&PropertyName::from("year"), MergePolicy::Strict));
    }
}
