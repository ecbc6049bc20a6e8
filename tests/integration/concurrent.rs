#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use kvgraph::{Direction, ElementKind, Graph, GraphConfig, MemoryStore, PropertyValue};

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

fn open(config: GraphConfig) -> Graph {
    Graph::open(config, Arc::new(MemoryStore::new())).expect("open graph")
}

#[test]
fn concurrent_vertex_creation_is_not_lost() {
    let graph = open(GraphConfig::new("g").max_buffered_mutations(7));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let graph = graph.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let v = graph.add_vertex(Some(&format!("v{t}_{i}"))).unwrap();
                    v.set_property("thread", t as i64).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(graph.vertices().unwrap().len(), THREADS * PER_THREAD);
    let third = graph.vertices_with("thread", 3).unwrap();
    assert_eq!(third.len(), PER_THREAD);
}

#[test]
fn concurrent_edges_on_a_shared_hub() {
    let graph = open(GraphConfig::new("g"));
    let hub = graph.add_vertex(Some("hub")).unwrap();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let graph = graph.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let id = format!("leaf{t}_{i}");
                    graph.add_vertex(Some(&id)).unwrap();
                    graph.add_edge(None, "hub", &id, "owns").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(hub.edges(Direction::Out, &["owns"]).unwrap().len(), THREADS * PER_THREAD);
    assert_eq!(graph.edges().unwrap().len(), THREADS * PER_THREAD);

    hub.remove().unwrap();
    assert!(graph.edges().unwrap().is_empty());
    assert_eq!(graph.vertices().unwrap().len(), THREADS * PER_THREAD);
}

#[test]
fn concurrent_indexed_writes_agree_with_the_store() {
    let graph = open(GraphConfig::new("g").vertex_cache_capacity(Some(4)));
    graph.create_key_index("bucket", ElementKind::Vertex).unwrap();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let graph = graph.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let v = graph.add_vertex(Some(&format!("n{t}_{i}"))).unwrap();
                    v.set_property("bucket", PropertyValue::from((i % 5) as i64)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let total: usize = (0..5)
        .map(|bucket| graph.vertices_with("bucket", bucket).unwrap().len())
        .sum();
    assert_eq!(total, THREADS * PER_THREAD);
}
