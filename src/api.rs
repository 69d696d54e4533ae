//! Transport-independent API layer.
//!
//! `ResearchGraphApi` is the single entry point for harvesting and
//! exploration collaborators. Transports (the CLI, a REST façade, direct
//! embedding) call its methods and never reach into the merge engine or the
//! store directly.

use std::io::BufRead;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::graph::{Category, GraphHandle, GraphResult, Node, NodeKey, PropertyName};
use crate::identity::{
    ConsistencyChecker, PersonRootAggregator, PersonRootConflict, PersonRootOutcome, Violation,
};
use crate::merge::{Fact, MergeEngine, MergePolicy, MergeReport, MergeSettings};
use crate::query::{EnrichmentComparator, EnrichmentResult};
use crate::storage::{GraphCounts, NeighborFilter, Neighbors, OpenStore, SqliteStore, StorageError};

/// A JSON Lines record that could not be merged
#[derive(Debug, Clone, Serialize)]
pub struct ImportRejection {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

/// Totals of a batch import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub merged: usize,
    pub rejected: Vec<ImportRejection>,
    /// Person-root conflicts raised by co-identity hints during this import
    pub conflicts: Vec<PersonRootConflict>,
}

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct ResearchGraphApi {
    handle: Arc<GraphHandle>,
}

impl ResearchGraphApi {
    pub fn new(handle: Arc<GraphHandle>) -> Self {
        Self { handle }
    }

    /// Open the configured SQLite database with the configured merge settings.
    pub fn open(config: &Config) -> GraphResult<Self> {
        let store = SqliteStore::open(config.database_path())?;
        let handle = GraphHandle::new(Arc::new(store), config.merge_settings());
        Ok(Self::new(Arc::new(handle)))
    }

    /// In-memory graph, for tests and dry runs.
    pub fn in_memory(settings: MergeSettings) -> GraphResult<Self> {
        let store = SqliteStore::open_in_memory()?;
        Ok(Self::new(Arc::new(GraphHandle::new(Arc::new(store), settings))))
    }

    pub fn handle(&self) -> &GraphHandle {
        &self.handle
    }

    // --- Write ---

    /// Merge one fact under an explicit policy and return the resulting node.
    pub fn merge_fact(
        &self,
        name: &str,
        category: Category,
        value: &str,
        source_system: &str,
        extra_properties: Vec<(PropertyName, String)>,
        merge_policy: MergePolicy,
    ) -> GraphResult<Node> {
        let mut fact = Fact::new(name, category, value, source_system);
        fact.properties = extra_properties;
        Ok(MergeEngine::new(&self.handle).merge_with(&fact, merge_policy)?.node)
    }

    /// Merge a complete fact, co-identity hints included, under the configured policy.
    pub fn merge(&self, fact: &Fact) -> GraphResult<MergeReport> {
        MergeEngine::new(&self.handle).merge(fact)
    }

    /// Assert that two identifier nodes denote the same person.
    pub fn connect_as_same_person(
        &self,
        key_a: &NodeKey,
        key_b: &NodeKey,
        source_system: &str,
    ) -> GraphResult<PersonRootOutcome> {
        PersonRootAggregator::new(&self.handle).connect_as_same_person(key_a, key_b, source_system)
    }

    /// Merge every fact of a JSON Lines stream, in order.
    ///
    /// Malformed lines and facts the merge engine rejects are reported and
    /// skipped. Storage failures abort the import.
    pub fn import_jsonl(&self, reader: impl BufRead) -> GraphResult<ImportSummary> {
        let engine = MergeEngine::new(&self.handle);
        let mut summary = ImportSummary::default();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(StorageError::from)?;
            if line.trim().is_empty() {
                continue;
            }

            let fact: Fact = match serde_json::from_str(&line) {
                Ok(fact) => fact,
                Err(e) => {
                    summary.rejected.push(ImportRejection {
                        line: line_no,
                        reason: format!("malformed fact: {}", e),
                    });
                    continue;
                }
            };

            match engine.merge(&fact) {
                Ok(report) => {
                    if report.created {
                        summary.created += 1;
                    } else {
                        summary.merged += 1;
                    }
                    summary.conflicts.extend(report.person_links.into_iter().filter_map(
                        |outcome| match outcome {
                            PersonRootOutcome::Conflict(c) => Some(c),
                            _ => None,
                        },
                    ));
                }
                Err(crate::graph::GraphError::Storage(e)) => return Err(e.into()),
                Err(e) => summary.rejected.push(ImportRejection {
                    line: line_no,
                    reason: e.to_string(),
                }),
            }
        }

        tracing::info!(
            created = summary.created,
            merged = summary.merged,
            rejected = summary.rejected.len(),
            conflicts = summary.conflicts.len(),
            "import finished"
        );
        Ok(summary)
    }

    /// Delete every node and edge.
    pub fn reset(&self) -> GraphResult<()> {
        self.handle.reset()
    }

    // --- Read ---

    pub fn find_node(&self, key: &NodeKey) -> GraphResult<Option<Node>> {
        self.handle.find_node(key)
    }

    /// Neighbors of `key` restricted by name/category include and exclude
    /// lists, at most `max_items` of them.
    pub fn neighbors(&self, key: &NodeKey, filter: &NeighborFilter) -> GraphResult<Neighbors> {
        self.handle.neighbors(key, filter)
    }

    /// Facts around `key` that `source_system` does not know yet.
    pub fn enrich(
        &self,
        key: &NodeKey,
        source_system: &str,
        filter: &NeighborFilter,
    ) -> GraphResult<EnrichmentResult> {
        EnrichmentComparator::new(&self.handle).enrich(key, source_system, filter)
    }

    pub fn all_person_root_nodes_of(&self, key: &NodeKey) -> GraphResult<Vec<Node>> {
        PersonRootAggregator::new(&self.handle).person_roots_of(key)
    }

    pub fn check_consistency(&self) -> GraphResult<Vec<Violation>> {
        ConsistencyChecker::new(&self.handle).check()
    }

    /// Person-root conflicts seen since the handle was opened.
    pub fn pending_conflicts(&self) -> Vec<PersonRootConflict> {
        self.handle.pending_conflicts()
    }

    pub fn stats(&self) -> GraphResult<GraphCounts> {
        self.handle.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;

    fn setup() -> ResearchGraphApi {
        ResearchGraphApi::in_memory(MergeSettings::default()).unwrap()
    }

    #[test]
    fn merge_fact_honors_explicit_policy() {
        let api = setup();
        let year = vec![(PropertyName::from("year"), "2024".to_string())];

        let strict = api
            .merge_fact("DOI", Category::Publication, "10.1/x", "SysA", year.clone(), MergePolicy::Strict)
            .unwrap();
        assert!(strict.properties.is_empty());

        let lenient = api
            .merge_fact("DOI", Category::Publication, "10.1/x", "SysB", year, MergePolicy::Lenient)
            .unwrap();
        assert_eq!(lenient.property(&PropertyName::from("year")), ["2024"]);
        assert_eq!(lenient.history().len(), 2);
    }

    #[test]
    fn import_counts_and_skips_bad_lines() {
        let api = setup();
        let input = concat!(
            r#"{"name":"ORCID","category":"person","value":"1","source_system":"SysA"}"#, "\n",
            "\n",
            "not json\n",
            r#"{"name":"orcid","category":"person","value":"1","source_system":"SysB"}"#, "\n",
            r#"{"name":"ORCID","category":"organization","value":"1","source_system":"SysC"}"#, "\n",
        );

        let summary = api.import_jsonl(input.as_bytes()).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.merged, 1);
        let lines: Vec<_> = summary.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, [3, 5]);
        assert!(summary.rejected[1].reason.contains("category conflict"));
    }

    #[test]
    fn import_collects_conflicts_from_hints() {
        let api = setup();
        let key = |name: &str, value: &str| NodeKey::compute(name, value).unwrap();
        for (name, value) in [("ORCID", "1"), ("FULL_NAME", "A"), ("ORCID", "2"), ("FULL_NAME", "B")] {
            api.merge(&Fact::new(name, Category::Person, value, "SysA")).unwrap();
        }
        api.connect_as_same_person(&key("ORCID", "1"), &key("FULL_NAME", "A"), "SysA").unwrap();
        api.connect_as_same_person(&key("ORCID", "2"), &key("FULL_NAME", "B"), "SysA").unwrap();

        let line = serde_json::to_string(
            &Fact::new("ORCID", Category::Person, "1", "SysB").same_person_as(key("ORCID", "2")),
        )
        .unwrap();
        let summary = api.import_jsonl(line.as_bytes()).unwrap();

        assert_eq!(summary.conflicts.len(), 1);
        assert_eq!(api.pending_conflicts().len(), 1);
    }

    #[test]
    fn read_operations_delegate() {
        let api = setup();
        let orcid = api
            .merge(&Fact::new("ORCID", Category::Person, "1", "SysA"))
            .unwrap()
            .node
            .key;
        let name = api
            .merge(&Fact::new("FULL_NAME", Category::Person, "John Doe", "SysB"))
            .unwrap()
            .node
            .key;
        let root = api
            .connect_as_same_person(&orcid, &name, "SysB")
            .unwrap()
            .into_result()
            .unwrap();

        assert!(api.find_node(&orcid).unwrap().is_some());
        assert_eq!(api.neighbors(&root, &NeighborFilter::new()).unwrap().len(), 2);
        assert_eq!(api.all_person_root_nodes_of(&orcid).unwrap()[0].key, root);
        assert_eq!(api.enrich(&orcid, "SysA", &NeighborFilter::new()).unwrap().facts.len(), 1);
        assert!(api.check_consistency().unwrap().is_empty());
        assert_eq!(api.stats().unwrap().nodes, 3);

        api.reset().unwrap();
        assert!(matches!(
            api.neighbors(&orcid, &NeighborFilter::new()).unwrap_err(),
            GraphError::NodeNotFound(_)
        ));
    }
}
