//! Property graph mapping layer over a sorted column-family key-value store.
//!
//! Vertices, edges, typed properties, automatic key indexes, and named
//! indexes are laid out as rows and columns of a handful of tables. The
//! store only offers ranged scans, per-row mutations, and bulk ranged
//! deletes, so every graph mutation is an ordered fan-out of independent
//! writes; see [`Graph`] for the sequence each operation follows.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kvgraph::{Direction, Graph, GraphConfig, MemoryStore};
//!
//! # fn main() -> kvgraph::Result<()> {
//! let graph = Graph::open(GraphConfig::new("social"), Arc::new(MemoryStore::new()))?;
//! let alice = graph.add_vertex(Some("alice"))?;
//! let bob = graph.add_vertex(Some("bob"))?;
//! alice.add_edge("knows", &bob)?;
//! assert_eq!(bob.vertices(Direction::In, &[])?, vec![alice]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cache;
pub mod config;
pub mod element;
pub mod encoding;
pub mod error;
mod graph;
pub mod logging;
pub mod model;
pub mod store;
mod tables;
pub mod writer;

pub use config::GraphConfig;
pub use element::{Edge, Element, Vertex};
pub use error::{GraphError, Result};
pub use graph::{Graph, Index};
pub use model::{Direction, ElementKind, PropertyValue};
pub use store::{KvStore, MemoryStore};
pub use writer::MutationWriter;
