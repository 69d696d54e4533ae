//! Structural checks over person-root clusters

use crate::graph::{Category, GraphHandle, GraphResult, NodeKey};
use crate::storage::{NeighborFilter, NodeFilter};
use serde::Serialize;

/// A structural defect found by `ConsistencyChecker`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A personally-identifying node hangs off more than one person-root
    MultipleRoots { key: NodeKey, roots: Vec<NodeKey> },
    /// A person-root with no identifier attached
    OrphanRoot { key: NodeKey },
    /// Two person-roots connected directly
    LinkedRoots { a: NodeKey, b: NodeKey },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleRoots { key, roots } => {
                write!(f, "{} has {} person-roots", key, roots.len())
            }
            Self::OrphanRoot { key } => write!(f, "person-root {} has no identifiers", key),
            Self::LinkedRoots { a, b } => write!(f, "person-roots {} and {} are connected", a, b),
        }
    }
}

/// Read-only scan for person-root defects
///
/// Reports, never repairs. Each node is read independently, so a scan that
/// runs alongside a merge sees a best-effort snapshot.
pub struct ConsistencyChecker<'a> {
    handle: &'a GraphHandle,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(handle: &'a GraphHandle) -> Self {
        Self { handle }
    }

    /// All violations, identifier problems first, each group ordered by key
    pub fn check(&self) -> GraphResult<Vec<Violation>> {
        let store = self.handle.store();
        let mut violations = Vec::new();

        let roots_only = NeighborFilter::new().want_category(Category::PersonRoot);
        let identifiers = store.find_nodes(&NodeFilter::new().with_category(Category::Person))?;
        for node in identifiers {
            let roots: Vec<NodeKey> = store.neighbors(&node.key, &roots_only)?.map(|r| r.key).collect();
            if roots.len() > 1 {
                violations.push(Violation::MultipleRoots {
                    key: node.key,
                    roots,
                });
            }
        }

        let roots = store.find_nodes(&NodeFilter::new().with_category(Category::PersonRoot))?;
        for root in roots {
            let mut has_identifier = false;
            for neighbor in store.neighbors(&root.key, &NeighborFilter::new())? {
                if neighbor.is_personally_identifying() {
                    has_identifier = true;
                } else if neighbor.is_person_root() && root.key < neighbor.key {
                    violations.push(Violation::LinkedRoots {
                        a: root.key.clone(),
                        b: neighbor.key,
                    });
                }
            }
            if !has_identifier {
                violations.push(Violation::OrphanRoot { key: root.key });
            }
        }

        if !violations.is_empty() {
            tracing::warn!(count = violations.len(), "consistency check found violations");
        }
        Ok(violations)
    }
}
