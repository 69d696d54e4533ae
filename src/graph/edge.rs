//! Undirected edges between nodes

use super::key::NodeKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An undirected edge, stored with its endpoints in key order
///
/// `Edge::new(a, b)` and `Edge::new(b, a)` describe the same edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Lower endpoint key
    pub key_a: NodeKey,
    /// Higher endpoint key
    pub key_b: NodeKey,
    /// Source system that first asserted the edge, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(a: NodeKey, b: NodeKey) -> Self {
        let (key_a, key_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            key_a,
            key_b,
            source: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.key_a == self.key_b
    }

    /// The endpoint opposite `key`, or None if `key` is not an endpoint
    pub fn other(&self, key: &NodeKey) -> Option<&NodeKey> {
        if &self.key_a == key {
            Some(&self.key_b)
        } else if &self.key_b == key {
            Some(&self.key_a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_ordered() {
        let x = NodeKey::from("orcid|b");
        let y = NodeKey::from("full_name|a");
        let forward = Edge::new(x.clone(), y.clone());
        let backward = Edge::new(y.clone(), x.clone());
        assert_eq!(forward.key_a, backward.key_a);
        assert_eq!(forward.key_b, backward.key_b);
        assert_eq!(forward.key_a, y);
    }

    #[test]
    fn other_endpoint() {
        let x = NodeKey::from("a");
        let y = NodeKey::from("b");
        let edge = Edge::new(x.clone(), y.clone());
        assert_eq!(edge.other(&x), Some(&y));
        assert_eq!(edge.other(&y), Some(&x));
        assert_eq!(edge.other(&NodeKey::from("c")), None);
    }

    #[test]
    fn detects_self_loops() {
        let x = NodeKey::from("a");
        assert!(Edge::new(x.clone(), x).is_self_loop());
    }
}
