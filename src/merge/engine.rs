//! MergeEngine: upserts harvested facts into the graph

use super::fact::Fact;
use super::policy::{CategoryResolution, MergePolicy};
use crate::graph::{Category, GraphError, GraphHandle, GraphResult, HistoryTracker, Node, NodeKey};
use crate::identity::{PersonRootAggregator, PersonRootOutcome};

/// Result of merging one fact
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// The node as stored after the merge
    pub node: Node,
    /// True if the fact created the node
    pub created: bool,
    /// Outcome of each co-identity hint that could be applied
    pub person_links: Vec<PersonRootOutcome>,
    /// Hints that were skipped (unknown key, not a person identifier, or the node itself)
    pub skipped_hints: Vec<NodeKey>,
}

/// Decides whether a fact creates, updates, or is rejected
///
/// Applying the same fact twice yields the same node except for one extra
/// history event.
pub struct MergeEngine<'a> {
    handle: &'a GraphHandle,
}

impl<'a> MergeEngine<'a> {
    pub fn new(handle: &'a GraphHandle) -> Self {
        Self { handle }
    }

    /// Merge under the policy the handle was configured with
    pub fn merge(&self, fact: &Fact) -> GraphResult<MergeReport> {
        self.merge_with(fact, self.handle.settings().policy)
    }

    /// Merge and return only the resulting node
    pub fn merge_fact(&self, fact: &Fact) -> GraphResult<Node> {
        Ok(self.merge(fact)?.node)
    }

    /// Merge under an explicit policy
    pub fn merge_with(&self, fact: &Fact, policy: MergePolicy) -> GraphResult<MergeReport> {
        if fact.category == Category::PersonRoot {
            return Err(GraphError::ReservedCategory(fact.category.clone()));
        }
        let key = fact.key()?;

        let (node, created) = match self.handle.find_node(&key)? {
            None => (self.create(fact, policy)?, true),
            Some(existing) => (self.update(existing, fact, policy)?, false),
        };

        let (person_links, skipped_hints) = self.apply_hints(&node, fact)?;

        Ok(MergeReport {
            node,
            created,
            person_links,
            skipped_hints,
        })
    }

    fn create(&self, fact: &Fact, policy: MergePolicy) -> GraphResult<Node> {
        let mut node = Node::new(fact.name.trim(), fact.category.clone(), fact.value.trim())?;
        let changes = self.apply_properties(&mut node, fact, policy);
        HistoryTracker::record_created(&mut node, &fact.source_system, changes);

        self.handle.store().create_node(&node)?;
        tracing::debug!(key = %node.key, source = %fact.source_system, "created node");
        Ok(node)
    }

    fn update(&self, mut node: Node, fact: &Fact, policy: MergePolicy) -> GraphResult<Node> {
        let mut changes = Vec::new();
        // Strict rejection happens before anything is touched
        if let CategoryResolution::KeepStored(note) =
            policy.reconcile_category(&node.key, &node.category, &fact.category)?
        {
            changes.push(note);
        }
        changes.extend(self.apply_properties(&mut node, fact, policy));
        HistoryTracker::record_merged(&mut node, &fact.source_system, changes);

        self.handle.store().update_node(&node)?;
        tracing::debug!(key = %node.key, source = %fact.source_system, "merged fact into node");
        Ok(node)
    }

    /// Add admitted property values; returns one `+name=value` entry per new value
    fn apply_properties(&self, node: &mut Node, fact: &Fact, policy: MergePolicy) -> Vec<String> {
        let mut changes = Vec::new();

        for (name, value) in &fact.properties {
            if !self.handle.admit_property(name, policy) {
                tracing::debug!(key = %node.key, property = %name, "dropping unlisted property");
                continue;
            }
            if node.add_property_value(name.clone(), value.clone()) {
                changes.push(format!("+{}={}", name, value));
            }
        }
        changes
    }

    /// Fold co-identity hints into person-root clusters
    fn apply_hints(
        &self,
        node: &Node,
        fact: &Fact,
    ) -> GraphResult<(Vec<PersonRootOutcome>, Vec<NodeKey>)> {
        if fact.same_person_as.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        if !node.is_personally_identifying() {
            tracing::warn!(key = %node.key, "ignoring co-identity hints on a non-person node");
            return Ok((Vec::new(), fact.same_person_as.clone()));
        }

        let aggregator = PersonRootAggregator::new(self.handle);
        let mut links = Vec::new();
        let mut skipped = Vec::new();

        for hint in &fact.same_person_as {
            match aggregator.connect_as_same_person(&node.key, hint, &fact.source_system) {
                Ok(outcome) => links.push(outcome),
                Err(
                    e @ (GraphError::NodeNotFound(_)
                    | GraphError::NotPersonIdentifying(_)
                    | GraphError::SelfLink(_)),
                ) => {
                    tracing::warn!(key = %node.key, hint = %hint, error = %e, "skipping co-identity hint");
                    skipped.push(hint.clone());
                }
                Err(e) => return Err(e),
            }
        }
        Ok((links, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{HistoryKind, PropertyName};
    use crate::merge::MergeSettings;
    use crate::storage::{NeighborFilter, OpenStore, SqliteStore};
    use std::sync::Arc;

    fn handle(policy: MergePolicy) -> GraphHandle {
        let store = SqliteStore::open_in_memory().unwrap();
        GraphHandle::new(Arc::new(store), MergeSettings::new(policy))
    }

    fn orcid(source: &str) -> Fact {
        Fact::new("ORCID", Category::Person, "0000-0001-9510-0802", source)
    }

    #[test]
    fn first_fact_creates_node_with_history() {
        let h = handle(MergePolicy::Strict);
        let report = MergeEngine::new(&h)
            .merge(&orcid("SysA").with_property("url_main", "https://orcid.org/x"))
            .unwrap();

        assert!(report.created);
        assert_eq!(report.node.history().len(), 1);
        assert_eq!(report.node.history()[0].kind, HistoryKind::Created);
        assert_eq!(report.node.history()[0].changes, ["+url_main=https://orcid.org/x"]);
        assert_eq!(h.get_node(&report.node.key).unwrap(), report.node);
    }

    #[test]
    fn merging_twice_only_adds_history() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        let fact = orcid("SysA").with_property("comment", "staff page");

        let first = engine.merge_fact(&fact).unwrap();
        let second = engine.merge(&fact).unwrap();

        assert!(!second.created);
        assert!(first.same_content(&second.node));
        assert_eq!(second.node.history().len(), first.history().len() + 1);
        assert!(second.node.history()[1].changes.is_empty());
        assert_eq!(h.stats().unwrap().nodes, 1);
    }

    #[test]
    fn normalized_duplicates_merge_into_one_node() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        engine.merge(&orcid("SysA")).unwrap();
        let report = engine
            .merge(&Fact::new("orcid", Category::Person, " 0000-0001-9510-0802 ", "SysB"))
            .unwrap();

        assert!(!report.created);
        assert_eq!(report.node.name, "ORCID");
        assert_eq!(h.stats().unwrap().nodes, 1);
    }

    #[test]
    fn differing_values_are_appended_not_overwritten() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        engine.merge(&orcid("SysA").with_property("comment", "one")).unwrap();
        let node = engine
            .merge_fact(&orcid("SysB").with_property("comment", "two"))
            .unwrap();

        assert_eq!(node.property(&PropertyName::Comment), ["one", "two"]);
    }

    #[test]
    fn strict_drops_unlisted_property_lenient_keeps_it() {
        let fact = orcid("SysA").with_property("year", "2024");

        let strict = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&strict);
        engine.merge(&orcid("SysA")).unwrap();
        let before = strict.get_node(&fact.key().unwrap()).unwrap();
        let after = engine.merge_fact(&fact).unwrap();
        assert!(before.same_content(&after));
        assert_eq!(after.history().len(), 2);

        let lenient = handle(MergePolicy::Lenient);
        let engine = MergeEngine::new(&lenient);
        engine.merge(&orcid("SysA")).unwrap();
        let after = engine.merge_fact(&fact).unwrap();
        assert_eq!(after.property(&PropertyName::from("year")), ["2024"]);
    }

    #[test]
    fn explicit_policy_overrides_configured_one() {
        let h = handle(MergePolicy::Strict);
        let node = MergeEngine::new(&h)
            .merge_with(&orcid("SysA").with_property("year", "2024"), MergePolicy::Lenient)
            .unwrap()
            .node;
        assert_eq!(node.property(&PropertyName::from("year")), ["2024"]);
    }

    #[test]
    fn strict_category_conflict_leaves_node_untouched() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        let stored = engine.merge_fact(&orcid("SysA")).unwrap();

        let conflicting = Fact::new("ORCID", Category::Organization, "0000-0001-9510-0802", "SysB");
        let err = engine.merge(&conflicting).unwrap_err();
        assert!(matches!(
            err,
            GraphError::CategoryConflict { stored: Category::Person, incoming: Category::Organization, .. }
        ));
        assert_eq!(h.get_node(&stored.key).unwrap(), stored);
    }

    #[test]
    fn lenient_category_conflict_keeps_first_category() {
        let h = handle(MergePolicy::Lenient);
        let engine = MergeEngine::new(&h);
        engine.merge(&orcid("SysA")).unwrap();

        let node = engine
            .merge_fact(&Fact::new("ORCID", Category::Organization, "0000-0001-9510-0802", "SysB"))
            .unwrap();
        assert_eq!(node.category, Category::Person);
        assert_eq!(
            node.history()[1].changes,
            ["category conflict: kept person, ignored organization"]
        );
    }

    #[test]
    fn rejects_invalid_and_reserved_facts() {
        let h = handle(MergePolicy::Lenient);
        let engine = MergeEngine::new(&h);

        assert!(matches!(
            engine.merge(&Fact::new("ORCID", Category::Person, "  ", "SysA")).unwrap_err(),
            GraphError::InvalidKey(_)
        ));
        assert!(matches!(
            engine.merge(&Fact::new("person-root", Category::PersonRoot, "x", "SysA")).unwrap_err(),
            GraphError::ReservedCategory(Category::PersonRoot)
        ));
        assert_eq!(h.stats().unwrap().nodes, 0);
    }

    #[test]
    fn co_identity_hint_links_through_person_root() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        let name = engine
            .merge_fact(&Fact::new("FULL_NAME", Category::Person, "John Doe", "SysA"))
            .unwrap();

        let report = engine.merge(&orcid("SysA").same_person_as(name.key.clone())).unwrap();
        assert_eq!(report.person_links.len(), 1);
        assert!(matches!(report.person_links[0], PersonRootOutcome::Created { .. }));

        let roots: Vec<_> = h
            .neighbors(&name.key, &NeighborFilter::new().want_category(Category::PersonRoot))
            .unwrap()
            .collect();
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn unusable_hints_are_skipped() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        let doi = engine
            .merge_fact(&Fact::new("DOI", Category::Publication, "10.1/x", "SysA"))
            .unwrap();
        let missing = NodeKey::compute("ISNI", "0000 0001").unwrap();

        let report = engine
            .merge(&orcid("SysA").same_person_as(missing.clone()).same_person_as(doi.key.clone()))
            .unwrap();
        assert!(report.person_links.is_empty());
        assert_eq!(report.skipped_hints, vec![missing, doi.key]);
        assert_eq!(h.stats().unwrap().edges, 0);
    }

    #[test]
    fn hints_on_a_non_person_fact_are_all_skipped() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        let a = engine.merge_fact(&orcid("SysA")).unwrap();
        let b = engine
            .merge_fact(&Fact::new("FULL_NAME", Category::Person, "John Doe", "SysA"))
            .unwrap();

        let report = engine
            .merge(
                &Fact::new("DOI", Category::Publication, "10.1/x", "SysA")
                    .same_person_as(a.key.clone())
                    .same_person_as(b.key.clone()),
            )
            .unwrap();

        assert!(report.created);
        assert!(report.person_links.is_empty());
        assert_eq!(report.skipped_hints, vec![a.key, b.key]);
        assert_eq!(h.stats().unwrap().edges, 0);
        assert_eq!(h.stats().unwrap().nodes, 3);
    }

    #[test]
    fn strict_merge_keeps_property_admitted_by_earlier_lenient_merge() {
        let h = handle(MergePolicy::Strict);
        let engine = MergeEngine::new(&h);
        let doi = |year: &str| {
            Fact::new("DOI", Category::Publication, "10.1/x", "SysA").with_property("year", year)
        };

        engine.merge_with(&doi("2024"), MergePolicy::Lenient).unwrap();
        let node = engine.merge_with(&doi("2025"), MergePolicy::Strict).unwrap().node;

        assert_eq!(node.property(&PropertyName::from("year")), ["2024", "2025"]);
        assert_eq!(node.history()[1].changes, ["+year=2025"]);
    }
}
