#![allow(missing_docs)]

use std::sync::Arc;

use kvgraph::encoding::serialize;
use kvgraph::store::{KvStore, Mutation, RowRange, ScanSpec};
use kvgraph::{Direction, ElementKind, Graph, GraphConfig, GraphError, MemoryStore, PropertyValue};

fn open(config: GraphConfig) -> (Arc<MemoryStore>, Graph) {
    let store = Arc::new(MemoryStore::new());
    let graph = Graph::open(config, store.clone()).expect("open graph");
    (store, graph)
}

fn family_cells(store: &MemoryStore, table: &str, row: &str, family: &[u8]) -> usize {
    store
        .scan(table, &ScanSpec::range(RowRange::exact(row)).fetch_family(family))
        .expect("scan")
        .len()
}

#[test]
fn vertex_exists_without_properties() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("v1")).unwrap();
    let vertex = graph.vertex("v1").unwrap().expect("vertex is live");
    assert!(vertex.property_keys().unwrap().is_empty());
    assert!(graph.vertex("nope").unwrap().is_none());
}

#[test]
fn duplicate_vertex_is_rejected() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("v1")).unwrap();
    let err = graph.add_vertex(Some("v1")).unwrap_err();
    assert!(matches!(
        err,
        GraphError::AlreadyExists { kind: ElementKind::Vertex, ref id } if id == "v1"
    ));
}

#[test]
fn skipped_existence_checks_allow_duplicates() {
    let (_store, graph) = open(GraphConfig::new("g").skip_existence_checks(true));
    graph.add_vertex(Some("v1")).unwrap();
    graph.add_vertex(Some("v1")).unwrap();
    assert_eq!(graph.vertices().unwrap().len(), 1);
}

#[test]
fn generated_ids_are_hex_and_distinct() {
    let (_store, graph) = open(GraphConfig::new("g"));
    let a = graph.add_vertex(None).unwrap();
    let b = graph.add_vertex(None).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(a.id().len(), 32);
    assert!(a.id().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn edge_adjacency_is_mirrored() {
    let (store, graph) = open(GraphConfig::new("g"));
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    let edge = graph.add_edge(Some("e"), "a", "b", "knows").unwrap();

    assert_eq!(family_cells(&store, "g_vertex", "a", b"_OUT_EDGE_"), 1);
    assert_eq!(family_cells(&store, "g_vertex", "a", b"_IN_EDGE_"), 0);
    assert_eq!(family_cells(&store, "g_vertex", "b", b"_IN_EDGE_"), 1);
    assert_eq!(family_cells(&store, "g_vertex", "b", b"_OUT_EDGE_"), 0);

    let out = a.edges(Direction::Out, &[]).unwrap();
    assert_eq!(out, vec![edge.clone()]);
    assert_eq!(out[0].in_vertex().unwrap(), b);
    assert!(a.edges(Direction::In, &[]).unwrap().is_empty());
    assert_eq!(b.vertices(Direction::In, &[]).unwrap(), vec![a.clone()]);
    assert_eq!(edge.label().unwrap(), "knows");
    assert!(a.edges(Direction::Both, &["likes"]).unwrap().is_empty());
}

#[test]
fn edge_lookup_reads_label_and_endpoints_from_store() {
    let store = Arc::new(MemoryStore::new());
    {
        let graph = Graph::open(GraphConfig::new("g"), store.clone()).unwrap();
        graph.add_vertex(Some("a")).unwrap();
        graph.add_vertex(Some("b")).unwrap();
        graph.add_edge(Some("e"), "a", "b", "knows").unwrap();
    }
    let graph = Graph::open(GraphConfig::new("g"), store).unwrap();
    let edge = graph.edge("e").unwrap().expect("edge is live");
    assert_eq!(edge.label().unwrap(), "knows");
    assert_eq!(edge.out_vertex().unwrap().id(), "a");
    assert_eq!(edge.in_vertex().unwrap().id(), "b");
    assert!(matches!(
        edge.vertex(Direction::Both),
        Err(GraphError::InvalidArgument(_))
    ));
}

#[test]
fn empty_label_is_rejected() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("a")).unwrap();
    let err = graph.add_edge(None, "a", "a", "").unwrap_err();
    assert!(matches!(err, GraphError::LabelRequired));
}

#[test]
fn removing_a_vertex_cascades_to_incident_edges() {
    let (store, graph) = open(GraphConfig::new("g"));
    for id in ["a", "b", "c"] {
        graph.add_vertex(Some(id)).unwrap();
    }
    graph.add_edge(Some("e1"), "a", "b", "L").unwrap();
    graph.add_edge(Some("e2"), "b", "c", "L").unwrap();

    graph.remove_vertex("b").unwrap();

    assert!(graph.edge("e1").unwrap().is_none());
    assert!(graph.edge("e2").unwrap().is_none());
    assert!(graph.vertex("b").unwrap().is_none());
    assert_eq!(family_cells(&store, "g_vertex", "a", b"_OUT_EDGE_"), 0);
    assert_eq!(family_cells(&store, "g_vertex", "c", b"_IN_EDGE_"), 0);
    assert!(graph.vertex("a").unwrap().is_some());
    assert!(graph.vertex("c").unwrap().is_some());
    assert_eq!(store.cell_count("g_edge"), 0);
}

#[test]
fn removing_a_vertex_with_a_self_loop() {
    let (store, graph) = open(GraphConfig::new("g"));
    let v = graph.add_vertex(Some("v")).unwrap();
    v.add_edge("self", &v).unwrap();
    assert_eq!(v.edges(Direction::Both, &[]).unwrap().len(), 2);
    v.remove().unwrap();
    assert_eq!(store.cell_count("g_vertex"), 0);
    assert_eq!(store.cell_count("g_edge"), 0);
}

#[test]
fn removing_an_edge_keeps_its_endpoints() {
    let (store, graph) = open(GraphConfig::new("g"));
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    a.set_property("name", "alice").unwrap();
    let edge = graph.add_edge(Some("e"), "a", "b", "knows").unwrap();

    edge.remove().unwrap();

    assert!(graph.edge("e").unwrap().is_none());
    assert!(a.edges(Direction::Both, &[]).unwrap().is_empty());
    assert!(b.edges(Direction::Both, &[]).unwrap().is_empty());
    assert_eq!(
        a.property("name").unwrap(),
        Some(PropertyValue::from("alice"))
    );
    assert_eq!(store.cell_count("g_edge"), 0);
}

#[test]
fn removing_missing_elements_fails_with_not_found() {
    let (_store, graph) = open(GraphConfig::new("g"));
    assert!(matches!(
        graph.remove_vertex("ghost"),
        Err(GraphError::NotFound { kind: ElementKind::Vertex, .. })
    ));
    assert!(matches!(
        graph.remove_edge("ghost"),
        Err(GraphError::NotFound { kind: ElementKind::Edge, .. })
    ));
}

#[test]
fn endpoint_checks_follow_configuration() {
    let (_store, lax) = open(GraphConfig::new("g"));
    lax.add_vertex(Some("a")).unwrap();
    let dangling = lax.add_edge(Some("e"), "a", "ghost", "knows").unwrap();
    assert_eq!(dangling.in_vertex().unwrap().id(), "ghost");
    assert!(lax.vertex("ghost").unwrap().is_none());

    let (_store, strict) = open(GraphConfig::new("g").check_edge_endpoints(true));
    strict.add_vertex(Some("a")).unwrap();
    let err = strict.add_edge(Some("e"), "a", "ghost", "knows").unwrap_err();
    assert!(matches!(
        err,
        GraphError::NotFound { kind: ElementKind::Vertex, ref id } if id == "ghost"
    ));
    assert!(strict.edge("e").unwrap().is_none());
}

#[test]
fn delimiter_in_id_is_rejected_before_writing() {
    let (store, graph) = open(GraphConfig::new("g"));
    let err = graph.add_vertex(Some("a__DELIM__b")).unwrap_err();
    assert!(matches!(err, GraphError::Encoding(_)));
    assert_eq!(store.cell_count("g_vertex"), 0);
}

#[test]
fn properties_round_trip_through_handles() {
    let (_store, graph) = open(GraphConfig::new("g"));
    let v = graph.add_vertex(Some("v")).unwrap();
    v.set_property("age", 30).unwrap();
    v.set_property("tags", vec![PropertyValue::from("x"), PropertyValue::from(true)])
        .unwrap();

    let fresh = graph.vertices().unwrap().pop().expect("one vertex");
    assert_eq!(fresh.property("age").unwrap(), Some(PropertyValue::Int(30)));
    let keys: Vec<String> = fresh.property_keys().unwrap().into_iter().collect();
    assert_eq!(keys, vec!["age".to_string(), "tags".to_string()]);

    assert_eq!(v.remove_property("age").unwrap(), Some(PropertyValue::Int(30)));
    assert_eq!(v.remove_property("age").unwrap(), None);
    assert_eq!(v.property("age").unwrap(), None);
}

#[test]
fn reserved_property_keys_are_rejected() {
    let (_store, graph) = open(GraphConfig::new("g"));
    let v = graph.add_vertex(Some("v")).unwrap();
    for key in ["id", "label", "", "_LABEL_", "_IN_EDGE_"] {
        assert!(
            matches!(v.set_property(key, 1), Err(GraphError::InvalidArgument(_))),
            "{key:?} accepted"
        );
    }
}

#[test]
fn preloaded_properties_come_back_with_the_lookup() {
    let store = Arc::new(MemoryStore::new());
    let config = GraphConfig::new("g").preload_properties(["name"]);
    {
        let graph = Graph::open(config.clone(), store.clone()).unwrap();
        graph.add_vertex(Some("v")).unwrap().set_property("name", "vera").unwrap();
    }
    let graph = Graph::open(config, store).unwrap();
    let v = graph.vertex("v").unwrap().unwrap();
    assert_eq!(v.property("name").unwrap(), Some(PropertyValue::from("vera")));
}

#[test]
fn edges_can_be_found_by_label() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("a")).unwrap();
    graph.add_vertex(Some("b")).unwrap();
    graph.add_edge(Some("e1"), "a", "b", "knows").unwrap();
    graph.add_edge(Some("e2"), "b", "a", "likes").unwrap();

    let knows = graph.edges_with("label", "knows").unwrap();
    assert_eq!(knows.len(), 1);
    assert_eq!(knows[0].id(), "e1");
    assert!(matches!(
        graph.edges_with("label", 3),
        Err(GraphError::InvalidArgument(_))
    ));
}

#[test]
fn clear_and_is_empty() {
    let (store, graph) = open(GraphConfig::new("g"));
    assert!(graph.is_empty().unwrap());
    graph.add_vertex(Some("a")).unwrap();
    graph.add_edge(None, "a", "a", "loop").unwrap();
    graph.create_index("people", ElementKind::Vertex).unwrap();
    assert!(!graph.is_empty().unwrap());

    graph.clear().unwrap();

    assert!(graph.is_empty().unwrap());
    assert!(graph.vertex("a").unwrap().is_none());
    assert!(!store.table_exists("g_index_people"));
    assert!(graph.indices().unwrap().is_empty());
}

#[test]
fn open_without_create_needs_existing_tables() {
    let store = Arc::new(MemoryStore::new());
    let err = Graph::open(GraphConfig::new("g").create(false), store.clone()).unwrap_err();
    assert!(matches!(err, GraphError::StoreUnavailable(_)));

    Graph::open(GraphConfig::new("g"), store.clone()).unwrap();
    Graph::open(GraphConfig::new("g").create(false), store).unwrap();
}

#[test]
fn open_applies_splits_and_clear_flag() {
    let store = Arc::new(MemoryStore::new());
    let graph = Graph::open(GraphConfig::new("g").splits(["m"]), store.clone()).unwrap();
    graph.add_vertex(Some("a")).unwrap();
    assert_eq!(store.splits("g_vertex"), vec![b"m".to_vec()]);

    let reopened = Graph::open(GraphConfig::new("g").clear(true), store.clone()).unwrap();
    assert!(reopened.is_empty().unwrap());
    assert!(store.splits("g_vertex").is_empty());
}

#[test]
fn invalid_configuration_is_rejected_on_open() {
    let store = Arc::new(MemoryStore::new());
    let err = Graph::open(GraphConfig::new("bad name"), store.clone()).unwrap_err();
    assert!(matches!(err, GraphError::Config(_)));
    assert!(store.list_tables().is_empty());
}

#[test]
fn shutdown_flushes_and_keeps_graph_usable() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("a")).unwrap();
    graph.shutdown().unwrap();
    assert!(graph.vertex("a").unwrap().is_some());
}

#[test]
fn skipped_checks_return_unverified_handles() {
    let (_store, graph) = open(GraphConfig::new("g").skip_existence_checks(true));
    let ghost = graph.edge("ghost").unwrap().expect("handle without a read");
    assert!(matches!(
        ghost.label(),
        Err(GraphError::NotFound { kind: ElementKind::Edge, .. })
    ));
    assert!(graph.vertex("nobody").unwrap().is_some());
}

#[test]
fn removed_elements_reject_property_writes() {
    let (store, graph) = open(GraphConfig::new("g"));
    let v = graph.add_vertex(Some("v")).unwrap();
    let w = graph.add_vertex(Some("w")).unwrap();
    let edge = v.add_edge("knows", &w).unwrap();

    edge.remove().unwrap();
    assert!(matches!(
        edge.set_property("since", 2019),
        Err(GraphError::NotFound { kind: ElementKind::Edge, .. })
    ));
    assert!(matches!(
        edge.remove_property("since"),
        Err(GraphError::NotFound { kind: ElementKind::Edge, .. })
    ));
    assert_eq!(store.cell_count("g_edge"), 0);

    v.remove().unwrap();
    assert!(matches!(
        v.set_property("age", 1),
        Err(GraphError::NotFound { kind: ElementKind::Vertex, .. })
    ));
    assert!(matches!(
        v.remove_property("age"),
        Err(GraphError::NotFound { kind: ElementKind::Vertex, .. })
    ));
    assert!(graph.vertices_with("age", 1).unwrap().is_empty());
    assert!(matches!(
        graph.remove_vertex("v"),
        Err(GraphError::NotFound { kind: ElementKind::Vertex, .. })
    ));
    assert_eq!(graph.vertices().unwrap().len(), 1);
}

#[test]
fn property_scans_skip_rows_without_a_marker() {
    let (store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("live")).unwrap().set_property("Age", 1).unwrap();
    let value = serialize(&PropertyValue::Int(1)).expect("serialize");
    let mut upper = Mutation::new("orphan");
    upper.put(b"Age", b"", value.clone());
    let mut lower = Mutation::new("orphan");
    lower.put(b"age", b"", value);
    store.apply("g_vertex", &[upper, lower]).unwrap();

    let ids = |key: &str| -> Vec<String> {
        graph
            .vertices_with(key, 1)
            .unwrap()
            .iter()
            .map(|v| v.id().to_owned())
            .collect()
    };
    assert_eq!(ids("Age"), vec!["live".to_string()]);
    assert!(ids("age").is_empty());

    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    assert_eq!(store.cell_count("g_vertex_key_index"), 0);
    graph.create_key_index("Age", ElementKind::Vertex).unwrap();
    assert_eq!(store.cell_count("g_vertex_key_index"), 1);
    assert_eq!(ids("Age"), vec!["live".to_string()]);
}

#[test]
fn label_key_is_matched_in_any_case() {
    let (_store, graph) = open(GraphConfig::new("g"));
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    a.add_edge("knows", &b).unwrap();
    a.add_edge("likes", &b).unwrap();

    for key in ["label", "Label", "LABEL"] {
        let found = graph.edges_with(key, "knows").unwrap();
        assert_eq!(found.len(), 1, "{key}");
        assert_eq!(found[0].label().unwrap(), "knows");
    }
    for key in ["Label", "ID"] {
        assert!(matches!(
            a.set_property(key, 1),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}
