//! Append-only provenance records on nodes

use super::node::Node;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of merge produced a history event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    /// The node was created by this fact
    Created,
    /// The fact was merged into an existing node
    Merged,
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// One immutable provenance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub kind: HistoryKind,
    /// Source system that submitted the fact
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Human-readable summary of what changed; empty when nothing did
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,
}

impl HistoryEvent {
    pub fn new(kind: HistoryKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            timestamp: Utc::now(),
            changes: Vec::new(),
        }
    }

    pub fn with_changes(mut self, changes: Vec<String>) -> Self {
        self.changes = changes;
        self
    }

    /// One-line rendering, e.g. `2024-05-01T10:00:00Z merged by SysB: +comment=...`
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} by {}",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.kind,
            self.source
        );
        if !self.changes.is_empty() {
            line.push_str(": ");
            line.push_str(&self.changes.join("; "));
        }
        line
    }
}

/// Appends provenance to nodes
///
/// The only writer of `Node::history`. Events are appended in call order and
/// never removed or reordered; person-root nodes never receive events.
pub struct HistoryTracker;

impl HistoryTracker {
    /// Record that `source` created `node`
    pub fn record_created(node: &mut Node, source: &str, changes: Vec<String>) {
        Self::append(node, HistoryEvent::new(HistoryKind::Created, source).with_changes(changes));
    }

    /// Record that `source` merged a fact into `node`, whether or not anything changed
    pub fn record_merged(node: &mut Node, source: &str, changes: Vec<String>) {
        Self::append(node, HistoryEvent::new(HistoryKind::Merged, source).with_changes(changes));
    }

    fn append(node: &mut Node, event: HistoryEvent) {
        if node.is_person_root() {
            tracing::warn!(key = %node.key, "refusing to record provenance on a person-root node");
            return;
        }
        let history = node.history_mut();
        // Keep timestamps non-decreasing even if the wall clock steps back.
        let event = match history.last() {
            Some(last) if last.timestamp > event.timestamp => HistoryEvent {
                timestamp: last.timestamp,
                ..event
            },
            _ => event,
        };
        history.push(event);
    }
}
