use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::{generate_id, Graph};
use crate::element::{Edge, Element, Vertex, VertexState};
use crate::encoding::{self, validate_id};
use crate::error::{GraphError, Result};
use crate::model::{Direction, ElementKind, PropertyValue};
use crate::tables::EdgeRecord;

impl Graph {
    /// Creates a vertex. A random id is generated when `id` is `None`.
    ///
    /// Unless existence checks are skipped, a caller-supplied id that is
    /// already live fails with [`GraphError::AlreadyExists`].
    pub fn add_vertex(&self, id: Option<&str>) -> Result<Vertex> {
        let inner = &self.inner;
        let id = match id {
            Some(id) => {
                validate_id(id)?;
                if !inner.config.skip_existence_checks && inner.vertices.exists(id)? {
                    return Err(GraphError::AlreadyExists {
                        kind: ElementKind::Vertex,
                        id: id.to_owned(),
                    });
                }
                id.to_owned()
            }
            None => generate_id(),
        };
        inner.vertices.write_vertex(&id)?;
        inner.writer.checked_flush()?;
        let state = Arc::new(VertexState::new(id.clone()));
        inner.caches.vertices.cache(id.clone(), state.clone());
        debug!(vertex = %id, "vertex added");
        Ok(Vertex::new(self.clone(), state))
    }

    /// Looks a vertex up by id.
    ///
    /// With existence checks skipped, an uncached id is returned without a
    /// store read.
    pub fn vertex(&self, id: &str) -> Result<Option<Vertex>> {
        validate_id(id)?;
        if self.inner.config.skip_existence_checks {
            return Ok(Some(self.vertex_handle(id)));
        }
        self.load_vertex(id)
    }

    /// Cached handle, or a store read of the existence marker plus the
    /// preloaded properties.
    pub(crate) fn load_vertex(&self, id: &str) -> Result<Option<Vertex>> {
        let inner = &self.inner;
        if let Some(state) = inner.caches.vertices.retrieve(id) {
            return Ok(Some(Vertex::new(self.clone(), state)));
        }
        let Some(props) = inner
            .vertices
            .read_properties(id, &inner.config.preload_properties)?
        else {
            return Ok(None);
        };
        let state = Arc::new(VertexState::with_properties(id.to_owned(), props));
        inner.caches.vertices.cache(id.to_owned(), state.clone());
        Ok(Some(Vertex::new(self.clone(), state)))
    }

    /// Every live vertex, in id order.
    pub fn vertices(&self) -> Result<Vec<Vertex>> {
        Ok(self
            .inner
            .vertices
            .scan_ids()?
            .iter()
            .map(|id| self.vertex_handle(id))
            .collect())
    }

    /// Vertices whose `key` property equals `value`.
    ///
    /// Uses the key index when `key` is indexed, otherwise scans the vertex
    /// table and compares values here.
    pub fn vertices_with(&self, key: &str, value: impl Into<PropertyValue>) -> Result<Vec<Vertex>> {
        let value = value.into();
        encoding::validate_property_key(key)?;
        if self.is_key_indexed(ElementKind::Vertex, key)? {
            let found = self.lookup_indexed(
                ElementKind::Vertex,
                self.key_index(ElementKind::Vertex),
                key,
                &value,
            )?;
            return Ok(found
                .into_iter()
                .filter_map(|element| match element {
                    Element::Vertex(v) => Some(v),
                    Element::Edge(_) => None,
                })
                .collect());
        }
        debug!(key, "no key index, scanning vertex table");
        Ok(self
            .inner
            .vertices
            .scan_property(key, &value)?
            .iter()
            .map(|id| self.vertex_handle(id))
            .collect())
    }

    /// Removes a vertex with its incident edges, adjacency mirrors, and
    /// key-index entries.
    ///
    /// Steps, each applied on its own: evict from the cache; queue removal
    /// of the mirrored adjacency entries on the neighbours, of the vertex's
    /// key-index entries, and of its named-index entries, then flush; bulk
    /// delete the incident edge rows; bulk delete the vertex row. The
    /// incident edges' own key-index entries are left behind.
    pub fn remove_vertex(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let inner = &self.inner;
        inner.caches.remove(ElementKind::Vertex, id);
        let cells = inner.vertices.row_cells(id)?;
        if cells.is_empty() {
            return Err(GraphError::not_found(ElementKind::Vertex, id));
        }
        let policy = self.key_index_policy(ElementKind::Vertex)?;
        let mut edge_ids = BTreeSet::new();
        let mut index_entries = 0usize;
        for cell in cells {
            let family = cell.key.family.as_slice();
            if encoding::family_direction(family).is_some() {
                let (other, edge) = encoding::split_adjacency_qualifier(&cell.key.qualifier)?;
                if other != id {
                    inner.vertices.delete_mirrored(id, family, &other, &edge)?;
                }
                inner.caches.remove(ElementKind::Edge, &edge);
                edge_ids.insert(edge);
            } else if !encoding::is_reserved_family(family) {
                let key = encoding::decode_id(family)?;
                if policy.covers(&key) {
                    inner.vertex_key_index.remove_raw(cell.value, &key, id)?;
                    index_entries += 1;
                }
            }
        }
        self.remove_from_named_indexes(ElementKind::Vertex, id)?;
        debug!(vertex = id, edges = edge_ids.len(), index_entries, "removing vertex");
        inner.writer.checked_flush()?;
        inner.edges.delete_rows(edge_ids.iter().map(String::as_str))?;
        inner.vertices.delete_rows([id])?;
        debug!(vertex = id, "vertex removed");
        Ok(())
    }

    pub(crate) fn adjacent_edges(&self, id: &str, direction: Direction, labels: &[&str]) -> Result<Vec<Edge>> {
        Ok(self
            .inner
            .vertices
            .adjacency(id, direction, labels)?
            .into_iter()
            .map(|entry| {
                let (out_id, in_id) = match entry.direction {
                    Direction::In => (entry.other, id.to_owned()),
                    _ => (id.to_owned(), entry.other),
                };
                self.edge_handle(EdgeRecord {
                    id: entry.edge,
                    label: entry.label,
                    out_id,
                    in_id,
                    ..EdgeRecord::default()
                })
            })
            .collect())
    }

    pub(crate) fn adjacent_vertices(&self, id: &str, direction: Direction, labels: &[&str]) -> Result<Vec<Vertex>> {
        Ok(self
            .inner
            .vertices
            .adjacency(id, direction, labels)?
            .iter()
            .map(|entry| self.vertex_handle(&entry.other))
            .collect())
    }
}
