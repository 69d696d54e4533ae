//! End-to-end harvest scenarios across several source systems
//!
//! Run with: `cargo test --test end_to_end`

mod common;

use common::{api, key, person_fact, root_edges, Harvest};
use researchgraph::{
    Category, Fact, HistoryKind, MergePolicy, NeighborFilter, PersonRootOutcome, Violation,
};

const ORCID: &str = "0000-0001-9510-0802";

#[test]
fn orcid_and_full_name_from_two_systems() {
    let api = api(MergePolicy::Strict);

    let orcid = api.merge(&person_fact("ORCID", ORCID, "SysA")).unwrap().node.key;
    let name = api.merge(&person_fact("FULL_NAME", "John Doe", "SysA")).unwrap().node.key;

    let outcome = api.connect_as_same_person(&orcid, &name, "SysA").unwrap();
    let root = match outcome {
        PersonRootOutcome::Created { root } => root,
        other => panic!("expected a new person-root, got {:?}", other),
    };
    assert_eq!(api.neighbors(&root, &NeighborFilter::new()).unwrap().len(), 2);
    assert_eq!(root_edges(&api, &orcid), vec![root.clone()]);
    assert_eq!(root_edges(&api, &name), vec![root.clone()]);

    let before = api.stats().unwrap();
    let report = api.merge(&person_fact("ORCID", ORCID, "SysB")).unwrap();
    assert!(!report.created);
    assert_eq!(api.stats().unwrap().nodes, before.nodes);

    let history = report.node.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, HistoryKind::Created);
    assert_eq!(history[0].source, "SysA");
    assert_eq!(history[1].kind, HistoryKind::Merged);
    assert_eq!(history[1].source, "SysB");

    let for_a = api.enrich(&orcid, "SysA", &NeighborFilter::new()).unwrap();
    assert!(for_a.facts.is_empty(), "SysA already knows everything: {:?}", for_a.facts);

    let for_c = api.enrich(&orcid, "SysC", &NeighborFilter::new()).unwrap();
    let orcid_fact = for_c
        .facts
        .iter()
        .find(|f| f.key == orcid)
        .expect("ORCID fact offered to SysC");
    assert_eq!(orcid_fact.value, ORCID);
    assert_eq!(orcid_fact.sources, ["SysA", "SysB"]);

    assert!(api.check_consistency().unwrap().is_empty());
}

#[test]
fn co_identity_hints_build_cluster_during_import() {
    let api = api(MergePolicy::Strict);
    let staff = Harvest::new("StaffDirectory")
        .person("FULL_NAME", "Jane Roe")
        .person("EMPLOYEE_ID", "E-1042");
    staff.run(&api);

    let registry = [
        person_fact("ORCID", "0000-0002-1825-0097", "PubRegistry")
            .same_person_as(key("FULL_NAME", "Jane Roe"))
            .same_person_as(key("EMPLOYEE_ID", "E-1042")),
        Fact::new("DOI", Category::Publication, "10.5555/12345678", "PubRegistry"),
    ];
    let jsonl = registry
        .iter()
        .map(|f| serde_json::to_string(f).unwrap())
        .collect::<Vec<_>>()
        .join("\n");

    let summary = api.import_jsonl(jsonl.as_bytes()).unwrap();
    assert_eq!(summary.created, 2);
    assert!(summary.rejected.is_empty());
    assert!(summary.conflicts.is_empty());

    let roots = root_edges(&api, &key("ORCID", "0000-0002-1825-0097"));
    assert_eq!(roots.len(), 1);
    for member in [key("FULL_NAME", "Jane Roe"), key("EMPLOYEE_ID", "E-1042")] {
        assert_eq!(root_edges(&api, &member), roots);
    }
    assert_eq!(
        api.all_person_root_nodes_of(&key("EMPLOYEE_ID", "E-1042")).unwrap()[0].key,
        roots[0]
    );
    assert!(api.check_consistency().unwrap().is_empty());
}

#[test]
fn conflicting_assertion_is_surfaced_not_repaired() {
    let api = api(MergePolicy::Lenient);
    Harvest::new("SysA")
        .person("ORCID", "1")
        .person("FULL_NAME", "J. Doe")
        .person("ORCID", "2")
        .person("FULL_NAME", "John Doe")
        .run(&api);
    api.connect_as_same_person(&key("ORCID", "1"), &key("FULL_NAME", "J. Doe"), "SysA")
        .unwrap();
    api.connect_as_same_person(&key("ORCID", "2"), &key("FULL_NAME", "John Doe"), "SysA")
        .unwrap();

    let before = api.stats().unwrap();
    let outcome = api
        .connect_as_same_person(&key("FULL_NAME", "J. Doe"), &key("FULL_NAME", "John Doe"), "SysB")
        .unwrap();

    assert!(matches!(outcome, PersonRootOutcome::Conflict(_)));
    assert_eq!(api.stats().unwrap(), before);
    assert_eq!(api.pending_conflicts().len(), 1);
    assert!(api.check_consistency().unwrap().is_empty());
}

#[test]
fn reset_empties_the_graph() {
    let api = api(MergePolicy::Strict);
    Harvest::new("SysA")
        .person("ORCID", ORCID)
        .fact("ROR", Category::Organization, "05xg72x27")
        .run(&api);

    api.reset().unwrap();
    let counts = api.stats().unwrap();
    assert_eq!(counts.nodes, 0);
    assert_eq!(counts.edges, 0);
    assert!(api.find_node(&key("ORCID", ORCID)).unwrap().is_none());
}

#[test]
fn orphan_root_is_reported() {
    use researchgraph::{Node, NodeStore};

    let api = api(MergePolicy::Strict);
    let root = Node::new_person_root();
    api.handle().store().create_node(&root).unwrap();

    assert_eq!(
        api.check_consistency().unwrap(),
        vec![Violation::OrphanRoot { key: root.key }]
    );
}
