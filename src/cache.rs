use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::element::{EdgeState, VertexState};
use crate::model::ElementKind;

/// Identity-keyed cache of live element state.
///
/// `None` capacity keeps every entry until it is removed explicitly;
/// `Some(0)` disables caching.
pub(crate) struct ElementCache<K: Hash + Eq, V: Clone> {
    kind: ElementKind,
    entries: Option<Mutex<LruCache<K, V>>>,
}

impl<K: Hash + Eq, V: Clone> ElementCache<K, V> {
    pub(crate) fn new(kind: ElementKind, capacity: Option<usize>) -> Self {
        let entries = match capacity {
            None => Some(LruCache::unbounded()),
            Some(cap) => NonZeroUsize::new(cap).map(LruCache::new),
        };
        Self {
            kind,
            entries: entries.map(Mutex::new),
        }
    }

    pub(crate) fn cache(&self, id: K, value: V) {
        if let Some(entries) = &self.entries {
            entries.lock().put(id, value);
        }
    }

    pub(crate) fn retrieve<Q>(&self, id: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.as_ref()?;
        let hit = entries.lock().get(id).cloned();
        trace!(kind = %self.kind, hit = hit.is_some(), "cache lookup");
        hit
    }

    pub(crate) fn remove<Q>(&self, id: &Q)
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(entries) = &self.entries {
            entries.lock().pop(id);
        }
    }

    pub(crate) fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.lock().len())
    }
}

/// Vertex and edge caches of one graph.
pub(crate) struct ElementCaches {
    pub(crate) vertices: ElementCache<String, Arc<VertexState>>,
    pub(crate) edges: ElementCache<String, Arc<EdgeState>>,
}

impl ElementCaches {
    pub(crate) fn new(vertex_capacity: Option<usize>, edge_capacity: Option<usize>) -> Self {
        Self {
            vertices: ElementCache::new(ElementKind::Vertex, vertex_capacity),
            edges: ElementCache::new(ElementKind::Edge, edge_capacity),
        }
    }

    pub(crate) fn remove(&self, kind: ElementKind, id: &str) {
        match kind {
            ElementKind::Vertex => self.vertices.remove(id),
            ElementKind::Edge => self.edges.remove(id),
        }
    }

    pub(crate) fn clear(&self, kind: ElementKind) {
        match kind {
            ElementKind::Vertex => self.vertices.clear(),
            ElementKind::Edge => self.edges.clear(),
        }
    }
}
