//! Vertex, edge, and element handles.
//!
//! A handle pairs the owning [`Graph`] with shared per-element state. The
//! state is what the element cache stores, so it never points back at the
//! graph.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::model::{Direction, ElementKind, PropertyValue};

/// Property values already read or written through a handle.
#[derive(Default)]
pub(crate) struct PropertyCache {
    values: RwLock<FxHashMap<String, PropertyValue>>,
}

impl PropertyCache {
    pub(crate) fn seeded(values: FxHashMap<String, PropertyValue>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<PropertyValue> {
        self.values.read().get(key).cloned()
    }

    pub(crate) fn insert(&self, key: &str, value: PropertyValue) {
        self.values.write().insert(key.to_owned(), value);
    }

    pub(crate) fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

pub(crate) struct VertexState {
    pub(crate) id: String,
    pub(crate) props: PropertyCache,
}

impl VertexState {
    pub(crate) fn new(id: String) -> Self {
        Self::with_properties(id, FxHashMap::default())
    }

    pub(crate) fn with_properties(id: String, props: FxHashMap<String, PropertyValue>) -> Self {
        Self {
            id,
            props: PropertyCache::seeded(props),
        }
    }
}

/// Label and endpoints of an edge. Immutable once the edge exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EdgeMeta {
    pub(crate) label: String,
    pub(crate) out_id: String,
    pub(crate) in_id: String,
}

pub(crate) struct EdgeState {
    pub(crate) id: String,
    meta: RwLock<Option<Arc<EdgeMeta>>>,
    pub(crate) props: PropertyCache,
}

impl EdgeState {
    pub(crate) fn new(id: String, meta: Option<EdgeMeta>) -> Self {
        Self::with_properties(id, meta, FxHashMap::default())
    }

    pub(crate) fn with_properties(
        id: String,
        meta: Option<EdgeMeta>,
        props: FxHashMap<String, PropertyValue>,
    ) -> Self {
        Self {
            id,
            meta: RwLock::new(meta.map(Arc::new)),
            props: PropertyCache::seeded(props),
        }
    }

    pub(crate) fn meta(&self) -> Option<Arc<EdgeMeta>> {
        self.meta.read().clone()
    }

    pub(crate) fn set_meta(&self, meta: EdgeMeta) -> Arc<EdgeMeta> {
        let meta = Arc::new(meta);
        *self.meta.write() = Some(meta.clone());
        meta
    }
}

/// Handle on a live vertex.
#[derive(Clone)]
pub struct Vertex {
    graph: Graph,
    state: Arc<VertexState>,
}

impl Vertex {
    pub(crate) fn new(graph: Graph, state: Arc<VertexState>) -> Self {
        Self { graph, state }
    }

    /// Vertex id.
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// Reads a property.
    pub fn property(&self, key: &str) -> Result<Option<PropertyValue>> {
        self.graph
            .element_property(ElementKind::Vertex, &self.state.id, &self.state.props, key)
    }

    /// Writes a property, keeping any key index on it in step.
    pub fn set_property(&self, key: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.graph.set_element_property(
            ElementKind::Vertex,
            &self.state.id,
            &self.state.props,
            key,
            value.into(),
        )
    }

    /// Removes a property and returns its previous value.
    pub fn remove_property(&self, key: &str) -> Result<Option<PropertyValue>> {
        self.graph
            .remove_element_property(ElementKind::Vertex, &self.state.id, &self.state.props, key)
    }

    /// Keys of every property on the vertex.
    pub fn property_keys(&self) -> Result<BTreeSet<String>> {
        self.graph.element_property_keys(ElementKind::Vertex, &self.state.id)
    }

    /// Incident edges in `direction`. An empty `labels` slice matches every label.
    pub fn edges(&self, direction: Direction, labels: &[&str]) -> Result<Vec<Edge>> {
        self.graph.adjacent_edges(&self.state.id, direction, labels)
    }

    /// Neighbouring vertices in `direction`, one per incident edge.
    pub fn vertices(&self, direction: Direction, labels: &[&str]) -> Result<Vec<Vertex>> {
        self.graph.adjacent_vertices(&self.state.id, direction, labels)
    }

    /// Adds an edge from this vertex to `head`.
    pub fn add_edge(&self, label: &str, head: &Vertex) -> Result<Edge> {
        self.graph.add_edge(None, self.id(), head.id(), label)
    }

    /// Removes the vertex and every incident edge.
    pub fn remove(&self) -> Result<()> {
        self.graph.remove_vertex(&self.state.id)
    }
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vertex").field("id", &self.state.id).finish()
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.state.id == other.state.id
    }
}

impl Eq for Vertex {}

/// Handle on a live edge.
#[derive(Clone)]
pub struct Edge {
    graph: Graph,
    state: Arc<EdgeState>,
}

impl Edge {
    pub(crate) fn new(graph: Graph, state: Arc<EdgeState>) -> Self {
        Self { graph, state }
    }

    /// Edge id.
    pub fn id(&self) -> &str {
        &self.state.id
    }

    fn meta(&self) -> Result<Arc<EdgeMeta>> {
        match self.state.meta() {
            Some(meta) => Ok(meta),
            None => self.graph.load_edge_meta(&self.state),
        }
    }

    /// Edge label.
    pub fn label(&self) -> Result<String> {
        Ok(self.meta()?.label.clone())
    }

    /// Tail (`Out`) or head (`In`) vertex. `Both` is rejected.
    pub fn vertex(&self, direction: Direction) -> Result<Vertex> {
        let meta = self.meta()?;
        let id = match direction {
            Direction::Out => &meta.out_id,
            Direction::In => &meta.in_id,
            Direction::Both => {
                return Err(GraphError::InvalidArgument(
                    "an edge endpoint needs a single direction".into(),
                ))
            }
        };
        Ok(self.graph.vertex_handle(id))
    }

    /// Tail vertex.
    pub fn out_vertex(&self) -> Result<Vertex> {
        self.vertex(Direction::Out)
    }

    /// Head vertex.
    pub fn in_vertex(&self) -> Result<Vertex> {
        self.vertex(Direction::In)
    }

    /// Reads a property.
    pub fn property(&self, key: &str) -> Result<Option<PropertyValue>> {
        self.graph
            .element_property(ElementKind::Edge, &self.state.id, &self.state.props, key)
    }

    /// Writes a property, keeping any key index on it in step.
    pub fn set_property(&self, key: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.graph.set_element_property(
            ElementKind::Edge,
            &self.state.id,
            &self.state.props,
            key,
            value.into(),
        )
    }

    /// Removes a property and returns its previous value.
    pub fn remove_property(&self, key: &str) -> Result<Option<PropertyValue>> {
        self.graph
            .remove_element_property(ElementKind::Edge, &self.state.id, &self.state.props, key)
    }

    /// Keys of every property on the edge.
    pub fn property_keys(&self) -> Result<BTreeSet<String>> {
        self.graph.element_property_keys(ElementKind::Edge, &self.state.id)
    }

    /// Removes the edge and its adjacency entries.
    pub fn remove(&self) -> Result<()> {
        self.graph.remove_edge(&self.state.id)
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge").field("id", &self.state.id).finish()
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.state.id == other.state.id
    }
}

impl Eq for Edge {}

/// Either kind of element, for APIs that accept both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Element {
    /// A vertex.
    Vertex(Vertex),
    /// An edge.
    Edge(Edge),
}

impl Element {
    /// Element id.
    pub fn id(&self) -> &str {
        match self {
            Element::Vertex(v) => v.id(),
            Element::Edge(e) => e.id(),
        }
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Vertex(_) => ElementKind::Vertex,
            Element::Edge(_) => ElementKind::Edge,
        }
    }

    /// Reads a property.
    pub fn property(&self, key: &str) -> Result<Option<PropertyValue>> {
        match self {
            Element::Vertex(v) => v.property(key),
            Element::Edge(e) => e.property(key),
        }
    }

    /// Writes a property.
    pub fn set_property(&self, key: &str, value: impl Into<PropertyValue>) -> Result<()> {
        match self {
            Element::Vertex(v) => v.set_property(key, value),
            Element::Edge(e) => e.set_property(key, value),
        }
    }

    /// Removes a property and returns its previous value.
    pub fn remove_property(&self, key: &str) -> Result<Option<PropertyValue>> {
        match self {
            Element::Vertex(v) => v.remove_property(key),
            Element::Edge(e) => e.remove_property(key),
        }
    }

    /// Keys of every property.
    pub fn property_keys(&self) -> Result<BTreeSet<String>> {
        match self {
            Element::Vertex(v) => v.property_keys(),
            Element::Edge(e) => e.property_keys(),
        }
    }

    /// Removes the element.
    pub fn remove(&self) -> Result<()> {
        match self {
            Element::Vertex(v) => v.remove(),
            Element::Edge(e) => e.remove(),
        }
    }

    /// The vertex, if this is one.
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Element::Vertex(v) => Some(v),
            Element::Edge(_) => None,
        }
    }

    /// The edge, if this is one.
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Element::Vertex(_) => None,
            Element::Edge(e) => Some(e),
        }
    }
}

impl From<Vertex> for Element {
    fn from(v: Vertex) -> Self {
        Element::Vertex(v)
    }
}

impl From<Edge> for Element {
    fn from(e: Edge) -> Self {
        Element::Edge(e)
    }
}
