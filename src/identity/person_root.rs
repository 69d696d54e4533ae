//! Person-root aggregation
//!
//! Every cluster of identifiers known to denote one physical person hangs off
//! a single synthetic person-root node. Roots are created lazily, the first
//! time two identifiers are asserted to co-refer, and are never merged
//! automatically: when two identifiers already belong to different roots the
//! call reports a conflict and leaves the graph as it was.

use crate::graph::{Category, Edge, GraphError, GraphHandle, GraphResult, Node, NodeKey};
use crate::storage::NeighborFilter;
use serde::Serialize;
use std::collections::BTreeMap;

/// Two identifiers asserted to co-refer already belong to different person-roots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonRootConflict {
    pub a: NodeKey,
    pub b: NodeKey,
    /// Every person-root either identifier is attached to, ordered by key
    pub roots: Vec<NodeKey>,
    /// Source system that made the assertion
    pub source: String,
}

impl std::fmt::Display for PersonRootConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let roots: Vec<&str> = self.roots.iter().map(|r| r.as_str()).collect();
        write!(
            f,
            "person-root conflict: {} and {} (asserted by {}) belong to roots [{}]",
            self.a,
            self.b,
            self.source,
            roots.join(", ")
        )
    }
}

/// What `connect_as_same_person` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PersonRootOutcome {
    /// Neither identifier had a root; a new one now anchors both
    Created { root: NodeKey },
    /// `key` joined the existing cluster of `root`
    Joined { root: NodeKey, key: NodeKey },
    /// Both identifiers already hung off `root`
    AlreadyLinked { root: NodeKey },
    /// Different roots; nothing was changed
    Conflict(PersonRootConflict),
}

impl PersonRootOutcome {
    /// The root both identifiers now share, unless the call conflicted
    pub fn root(&self) -> Option<&NodeKey> {
        match self {
            Self::Created { root } | Self::Joined { root, .. } | Self::AlreadyLinked { root } => {
                Some(root)
            }
            Self::Conflict(_) => None,
        }
    }

    /// Turn a conflict into `GraphError::PersonRootConflict`
    pub fn into_result(self) -> GraphResult<NodeKey> {
        match self {
            Self::Created { root } | Self::Joined { root, .. } | Self::AlreadyLinked { root } => {
                Ok(root)
            }
            Self::Conflict(conflict) => Err(GraphError::PersonRootConflict(conflict)),
        }
    }
}

/// Maintains one person-root per identifier cluster
pub struct PersonRootAggregator<'a> {
    handle: &'a GraphHandle,
}

impl<'a> PersonRootAggregator<'a> {
    pub fn new(handle: &'a GraphHandle) -> Self {
        Self { handle }
    }

    /// Record that identifiers `a` and `b` denote the same person
    ///
    /// Both must exist and be personally identifying. Conflicts are returned
    /// as data, logged, and kept in the handle's conflict register.
    pub fn connect_as_same_person(
        &self,
        a: &NodeKey,
        b: &NodeKey,
        source: &str,
    ) -> GraphResult<PersonRootOutcome> {
        if a == b {
            return Err(GraphError::SelfLink(a.clone()));
        }
        let node_a = self.identifier(a)?;
        let node_b = self.identifier(b)?;

        let mut roots: BTreeMap<NodeKey, Node> = self
            .roots_of(&node_a.key)?
            .into_iter()
            .chain(self.roots_of(&node_b.key)?)
            .map(|root| (root.key.clone(), root))
            .collect();

        if roots.len() > 1 {
            let conflict = PersonRootConflict {
                a: a.clone(),
                b: b.clone(),
                roots: roots.into_keys().collect(),
                source: source.to_string(),
            };
            tracing::warn!(%conflict, "refusing to merge person-roots");
            self.handle.record_conflict(conflict.clone());
            return Ok(PersonRootOutcome::Conflict(conflict));
        }

        let Some((_, root)) = roots.pop_first() else {
            let root = Node::new_person_root();
            // The root never exists without both of its first members
            let edges = [&node_a, &node_b]
                .map(|node| Edge::new(node.key.clone(), root.key.clone()).with_source(source));
            self.handle.store().create_node_with_edges(&root, &edges)?;
            tracing::info!(root = %root.key, a = %a, b = %b, source, "created person-root");
            return Ok(PersonRootOutcome::Created { root: root.key });
        };

        let mut joined = None;
        for node in [&node_a, &node_b] {
            if self.handle.connect(node, &root, Some(source))? {
                joined = Some(node.key.clone());
            }
        }
        match joined {
            Some(key) => {
                tracing::debug!(root = %root.key, key = %key, source, "joined person cluster");
                Ok(PersonRootOutcome::Joined { root: root.key, key })
            }
            None => Ok(PersonRootOutcome::AlreadyLinked { root: root.key }),
        }
    }

    /// All person-root nodes of `key`, ordered by key
    ///
    /// A person-root is its own root. Nodes outside any cluster have none.
    pub fn person_roots_of(&self, key: &NodeKey) -> GraphResult<Vec<Node>> {
        let node = self.handle.get_node(key)?;
        if node.is_person_root() {
            return Ok(vec![node]);
        }
        self.roots_of(key)
    }

    fn identifier(&self, key: &NodeKey) -> GraphResult<Node> {
        let node = self.handle.get_node(key)?;
        if !node.is_personally_identifying() {
            return Err(GraphError::NotPersonIdentifying(key.clone()));
        }
        Ok(node)
    }

    fn roots_of(&self, key: &NodeKey) -> GraphResult<Vec<Node>> {
        let filter = NeighborFilter::new().want_category(Category::PersonRoot);
        Ok(self.handle.store().neighbors(key, &filter)?.collect())
    }
}
