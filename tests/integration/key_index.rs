#![allow(missing_docs)]

use std::sync::Arc;

use kvgraph::encoding::serialize;
use kvgraph::store::{KvStore, RowRange, ScanSpec};
use kvgraph::{ElementKind, Graph, GraphConfig, GraphError, MemoryStore, PropertyValue};

fn open(config: GraphConfig) -> (Arc<MemoryStore>, Graph) {
    let store = Arc::new(MemoryStore::new());
    let graph = Graph::open(config, store.clone()).expect("open graph");
    (store, graph)
}

/// Ids stored in `table` under `key` = `value`.
fn index_ids(store: &MemoryStore, table: &str, key: &str, value: impl Into<PropertyValue>) -> Vec<String> {
    let row = serialize(&value.into()).expect("serialize");
    store
        .scan(table, &ScanSpec::range(RowRange::exact(row)).fetch_family(key.as_bytes()))
        .expect("scan")
        .into_iter()
        .map(|cell| String::from_utf8(cell.key.qualifier).expect("utf8 id"))
        .collect()
}

fn ids<T: AsRef<str>>(items: impl IntoIterator<Item = T>) -> Vec<String> {
    items.into_iter().map(|s| s.as_ref().to_owned()).collect()
}

#[test]
fn indexed_writes_keep_one_entry_per_value() {
    let (store, graph) = open(GraphConfig::new("g"));
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    let v = graph.add_vertex(Some("v")).unwrap();

    v.set_property("age", 30).unwrap();
    assert_eq!(index_ids(&store, "g_vertex_key_index", "age", 30), ids(["v"]));

    v.set_property("age", 31).unwrap();
    assert!(index_ids(&store, "g_vertex_key_index", "age", 30).is_empty());
    assert_eq!(index_ids(&store, "g_vertex_key_index", "age", 31), ids(["v"]));

    v.set_property("age", 31).unwrap();
    assert_eq!(store.cell_count("g_vertex_key_index"), 1);

    let found = graph.vertices_with("age", 31).unwrap();
    assert_eq!(found, vec![v.clone()]);
    assert!(graph.vertices_with("age", 30).unwrap().is_empty());
}

#[test]
fn creating_an_index_rebuilds_existing_entries() {
    let (store, graph) = open(GraphConfig::new("g"));
    for (id, city) in [("a", "oslo"), ("b", "oslo"), ("c", "rome")] {
        graph.add_vertex(Some(id)).unwrap().set_property("city", city).unwrap();
    }
    graph.add_vertex(Some("d")).unwrap();
    assert_eq!(store.cell_count("g_vertex_key_index"), 0);

    graph.create_key_index("city", ElementKind::Vertex).unwrap();

    assert_eq!(store.cell_count("g_vertex_key_index"), 3);
    assert_eq!(index_ids(&store, "g_vertex_key_index", "city", "oslo"), ids(["a", "b"]));
    let rome: Vec<String> = graph
        .vertices_with("city", "rome")
        .unwrap()
        .iter()
        .map(|v| v.id().to_owned())
        .collect();
    assert_eq!(rome, ids(["c"]));
}

#[test]
fn duplicate_key_index_is_rejected() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    let err = graph.create_key_index("age", ElementKind::Vertex).unwrap_err();
    assert!(matches!(
        err,
        GraphError::KeyIndexAlreadyExists { ref key, kind: ElementKind::Vertex } if key == "age"
    ));
    graph.create_key_index("age", ElementKind::Edge).unwrap();
}

#[test]
fn indexed_keys_are_tracked_per_kind() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    graph.create_key_index("name", ElementKind::Vertex).unwrap();
    graph.create_key_index("weight", ElementKind::Edge).unwrap();

    assert_eq!(graph.indexed_keys(ElementKind::Vertex).unwrap(), ids(["age", "name"]));
    assert_eq!(graph.indexed_keys(ElementKind::Edge).unwrap(), ids(["weight"]));

    graph.drop_key_index("age", ElementKind::Vertex).unwrap();
    assert_eq!(graph.indexed_keys(ElementKind::Vertex).unwrap(), ids(["name"]));
    graph.drop_key_index("never", ElementKind::Vertex).unwrap();
}

#[test]
fn dropping_an_index_deletes_only_its_entries() {
    let (store, graph) = open(GraphConfig::new("g"));
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    graph.create_key_index("name", ElementKind::Vertex).unwrap();
    let v = graph.add_vertex(Some("v")).unwrap();
    v.set_property("age", 7).unwrap();
    v.set_property("name", "vic").unwrap();

    graph.drop_key_index("age", ElementKind::Vertex).unwrap();

    assert!(index_ids(&store, "g_vertex_key_index", "age", 7).is_empty());
    assert_eq!(index_ids(&store, "g_vertex_key_index", "name", "vic"), ids(["v"]));
    assert_eq!(graph.vertices_with("age", 7).unwrap(), vec![v]);
}

#[test]
fn removing_properties_and_elements_cleans_entries() {
    let (store, graph) = open(GraphConfig::new("g"));
    graph.create_key_index("age", ElementKind::Vertex).unwrap();
    graph.create_key_index("weight", ElementKind::Edge).unwrap();
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    a.set_property("age", 1).unwrap();
    b.set_property("age", 2).unwrap();
    let edge = a.add_edge("knows", &b).unwrap();
    edge.set_property("weight", 0.5).unwrap();

    a.remove_property("age").unwrap();
    assert!(index_ids(&store, "g_vertex_key_index", "age", 1).is_empty());

    edge.remove().unwrap();
    assert_eq!(store.cell_count("g_edge_key_index"), 0);

    b.remove().unwrap();
    assert_eq!(store.cell_count("g_vertex_key_index"), 0);
}

#[test]
fn stale_entries_left_by_cascades_heal_on_lookup() {
    let (store, graph) = open(GraphConfig::new("g"));
    graph.create_key_index("weight", ElementKind::Edge).unwrap();
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    let edge = a.add_edge("knows", &b).unwrap();
    edge.set_property("weight", 3).unwrap();

    graph.remove_vertex("a").unwrap();
    assert_eq!(store.cell_count("g_edge_key_index"), 1);

    assert!(graph.edges_with("weight", 3).unwrap().is_empty());
    assert_eq!(store.cell_count("g_edge_key_index"), 0);
}

#[test]
fn auto_index_covers_every_key() {
    let (store, graph) = open(GraphConfig::new("g").auto_index(true));
    let v = graph.add_vertex(Some("v")).unwrap();
    v.set_property("colour", "red").unwrap();
    let e = v.add_edge("self", &v).unwrap();
    e.set_property("since", 2001).unwrap();

    assert_eq!(index_ids(&store, "g_vertex_key_index", "colour", "red"), ids(["v"]));
    assert_eq!(index_ids(&store, "g_edge_key_index", "since", 2001), ids([e.id()]));
    assert_eq!(graph.vertices_with("colour", "red").unwrap(), vec![v]);
    assert_eq!(graph.edges_with("since", 2001).unwrap(), vec![e]);
    assert!(graph.indexed_keys(ElementKind::Vertex).unwrap().is_empty());
}

#[test]
fn unindexed_lookups_scan_and_compare_values() {
    let (store, graph) = open(GraphConfig::new("g"));
    let a = graph.add_vertex(Some("a")).unwrap();
    let b = graph.add_vertex(Some("b")).unwrap();
    a.set_property("score", 1.5).unwrap();
    b.set_property("score", PropertyValue::from("1.5")).unwrap();

    assert_eq!(graph.vertices_with("score", 1.5).unwrap(), vec![a]);
    assert_eq!(graph.vertices_with("score", "1.5").unwrap(), vec![b]);
    assert_eq!(store.cell_count("g_vertex_key_index"), 0);
}

#[test]
fn reserved_keys_can_not_be_indexed() {
    let (_store, graph) = open(GraphConfig::new("g"));
    assert!(matches!(
        graph.create_key_index("id", ElementKind::Vertex),
        Err(GraphError::InvalidArgument(_))
    ));
    assert!(matches!(
        graph.create_key_index("_OUT_EDGE_", ElementKind::Edge),
        Err(GraphError::InvalidArgument(_))
    ));
}

#[test]
fn float_lookups_agree_with_and_without_an_index() {
    let (_store, graph) = open(GraphConfig::new("g"));
    graph.add_vertex(Some("zero")).unwrap().set_property("x", 0.0).unwrap();
    graph.add_vertex(Some("neg")).unwrap().set_property("x", -0.0).unwrap();
    graph.add_vertex(Some("nan")).unwrap().set_property("x", f64::NAN).unwrap();

    let ids = |value: f64| -> Vec<String> {
        let mut ids: Vec<String> = graph
            .vertices_with("x", value)
            .unwrap()
            .iter()
            .map(|v| v.id().to_owned())
            .collect();
        ids.sort();
        ids
    };
    let zero = vec!["neg".to_string(), "zero".to_string()];
    let nan = vec!["nan".to_string()];
    assert_eq!(ids(0.0), zero);
    assert_eq!(ids(-0.0), zero);
    assert_eq!(ids(f64::NAN), nan);
    assert_eq!(ids(-f64::NAN), nan);

    graph.create_key_index("x", ElementKind::Vertex).unwrap();
    assert_eq!(ids(0.0), zero);
    assert_eq!(ids(-0.0), zero);
    assert_eq!(ids(f64::NAN), nan);
    assert_eq!(ids(-f64::NAN), nan);
}
