//! The graph façade: element lifecycle, properties, and indexes on top of
//! the table wrappers.
//!
//! Every multi-table mutation is an ordered sequence of sub-steps, each of
//! which may be applied on its own. Nothing is rolled back; an error in the
//! middle leaves the completed steps in place and is returned to the caller.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::ElementCaches;
use crate::config::GraphConfig;
use crate::encoding;
use crate::element::{Edge, EdgeMeta, EdgeState, Vertex, VertexState};
use crate::error::{GraphError, Result};
use crate::model::ElementKind;
use crate::store::{KvStore, RowRange, ScanSpec};
use crate::tables::{
    BaseTable, EdgeRecord, EdgeTable, ElementTable, IndexNamesTable, IndexedKeysTable,
    KeyIndexTable, VertexTable,
};
use crate::writer::MutationWriter;

mod edge_ops;
mod index_ops;
mod prop_ops;
mod vertex_ops;

pub use index_ops::Index;

pub(crate) struct GraphInner {
    config: GraphConfig,
    store: Arc<dyn KvStore>,
    writer: Arc<MutationWriter>,
    caches: ElementCaches,
    authorizations: Arc<[String]>,
    vertices: VertexTable,
    edges: EdgeTable,
    vertex_key_index: KeyIndexTable,
    edge_key_index: KeyIndexTable,
    indexed_keys: IndexedKeysTable,
    index_names: IndexNamesTable,
}

/// A property graph stored in a sorted key-value store.
///
/// Cheap to clone; clones share the writer and the element caches. All
/// methods block on store round trips and may be called from several
/// threads at once. There is no isolation between concurrent calls.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Graph {
    /// Validates `config`, prepares the tables, and opens the graph with a
    /// writer sized from the configuration.
    pub fn open(config: GraphConfig, store: Arc<dyn KvStore>) -> Result<Self> {
        config.validate()?;
        let writer = Arc::new(MutationWriter::new(
            store.clone(),
            config.max_buffered_mutations,
        ));
        Self::open_with_writer(config, store, writer)
    }

    /// Opens the graph around an existing writer, which may be shared with
    /// other graphs on the same store.
    pub fn open_with_writer(
        config: GraphConfig,
        store: Arc<dyn KvStore>,
        writer: Arc<MutationWriter>,
    ) -> Result<Self> {
        config.validate()?;
        prepare_tables(&config, store.as_ref())?;
        let authorizations: Arc<[String]> = config.authorizations.clone().into();
        let table = |name: String| {
            BaseTable::new(
                store.clone(),
                writer.clone(),
                name,
                config.query_threads,
                authorizations.clone(),
            )
        };
        let inner = GraphInner {
            vertices: VertexTable::new(table(config.vertex_table())),
            edges: EdgeTable::new(table(config.edge_table())),
            vertex_key_index: KeyIndexTable::new(table(config.vertex_key_index_table())),
            edge_key_index: KeyIndexTable::new(table(config.edge_key_index_table())),
            indexed_keys: IndexedKeysTable::new(table(config.indexed_keys_table())),
            index_names: IndexNamesTable::new(table(config.index_names_table())),
            caches: ElementCaches::new(config.vertex_cache_capacity, config.edge_cache_capacity),
            authorizations,
            config,
            store,
            writer,
        };
        info!(graph = %inner.config.graph_name, "graph opened");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Configuration the graph was opened with.
    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Forces every buffered mutation to the store.
    pub fn flush(&self) -> Result<()> {
        self.inner.writer.checked_flush()
    }

    /// Flushes pending writes and empties both element caches. The graph
    /// stays usable afterwards.
    pub fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        debug!(
            cached_vertices = inner.caches.vertices.len(),
            cached_edges = inner.caches.edges.len(),
            "dropping element caches"
        );
        inner.caches.clear(ElementKind::Vertex);
        inner.caches.clear(ElementKind::Edge);
        inner.writer.close()?;
        info!(graph = %inner.config.graph_name, "graph shut down");
        Ok(())
    }

    /// Drops and recreates every table of the graph, named index tables
    /// included.
    pub fn clear(&self) -> Result<()> {
        let inner = &self.inner;
        inner.writer.checked_flush()?;
        inner.caches.clear(ElementKind::Vertex);
        inner.caches.clear(ElementKind::Edge);
        drop_tables(&inner.config, inner.store.as_ref())?;
        prepare_tables(&inner.config, inner.store.as_ref())?;
        info!(graph = %inner.config.graph_name, "graph cleared");
        Ok(())
    }

    /// Whether the graph holds no vertex and no edge.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.inner.vertices.is_empty()? && self.inner.edges.is_empty()?)
    }

    pub(crate) fn element_table(&self, kind: ElementKind) -> &ElementTable {
        match kind {
            ElementKind::Vertex => &*self.inner.vertices,
            ElementKind::Edge => &*self.inner.edges,
        }
    }

    pub(crate) fn key_index(&self, kind: ElementKind) -> &KeyIndexTable {
        match kind {
            ElementKind::Vertex => &self.inner.vertex_key_index,
            ElementKind::Edge => &self.inner.edge_key_index,
        }
    }

    fn named_table(&self, name: &str) -> KeyIndexTable {
        let inner = &self.inner;
        KeyIndexTable::new(BaseTable::new(
            inner.store.clone(),
            inner.writer.clone(),
            inner.config.named_index_table(name),
            inner.config.query_threads,
            inner.authorizations.clone(),
        ))
    }

    /// Handle on `id` without reading the store. Unverified handles are
    /// never put in the cache.
    pub(crate) fn vertex_handle(&self, id: &str) -> Vertex {
        let state = self
            .inner
            .caches
            .vertices
            .retrieve(id)
            .unwrap_or_else(|| Arc::new(VertexState::new(id.to_owned())));
        Vertex::new(self.clone(), state)
    }

    /// Handle on an edge whose structure is already known.
    pub(crate) fn edge_handle(&self, record: EdgeRecord) -> Edge {
        let meta = EdgeMeta {
            label: record.label,
            out_id: record.out_id,
            in_id: record.in_id,
        };
        let caches = &self.inner.caches;
        let state = match caches.edges.retrieve(record.id.as_str()) {
            Some(state) => {
                if state.meta().is_none() {
                    state.set_meta(meta);
                }
                state
            }
            None => {
                let state = Arc::new(EdgeState::with_properties(
                    record.id.clone(),
                    Some(meta),
                    record.properties,
                ));
                caches.edges.cache(record.id, state.clone());
                state
            }
        };
        Edge::new(self.clone(), state)
    }

    /// Reads the label and endpoints of an edge handed out without them.
    pub(crate) fn load_edge_meta(&self, state: &EdgeState) -> Result<Arc<EdgeMeta>> {
        let record = self
            .inner
            .edges
            .read_edge(&state.id, &[])?
            .ok_or_else(|| GraphError::not_found(ElementKind::Edge, state.id.as_str()))?;
        Ok(state.set_meta(EdgeMeta {
            label: record.label,
            out_id: record.out_id,
            in_id: record.in_id,
        }))
    }
}

/// Random 128-bit id rendered as lowercase hex.
pub(crate) fn generate_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

fn prepare_tables(config: &GraphConfig, store: &dyn KvStore) -> Result<()> {
    if config.clear {
        drop_tables(config, store)?;
    }
    let splits = config.split_rows();
    for table in config.table_names() {
        if store.table_exists(&table) {
            continue;
        }
        if !config.create {
            return Err(GraphError::StoreUnavailable(format!(
                "table {table} does not exist and table creation is disabled"
            )));
        }
        store.create_table(&table)?;
        if !splits.is_empty() {
            store.add_splits(&table, &splits)?;
        }
        debug!(table = %table, splits = splits.len(), "table created");
    }
    Ok(())
}

/// Deletes the named index tables listed in the registry, then the fixed
/// tables. Missing tables are skipped.
fn drop_tables(config: &GraphConfig, store: &dyn KvStore) -> Result<()> {
    let registry = config.index_names_table();
    if store.table_exists(&registry) {
        for cell in store.scan(&registry, &ScanSpec::range(RowRange::All))? {
            let name = encoding::decode_id(&cell.key.row)?;
            let table = config.named_index_table(&name);
            if store.table_exists(&table) {
                store.delete_table(&table)?;
            }
        }
    }
    for table in config.table_names() {
        if store.table_exists(&table) {
            store.delete_table(&table)?;
            debug!(table = %table, "table dropped");
        }
    }
    Ok(())
}
