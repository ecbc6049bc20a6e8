use std::sync::Arc;

use tracing::debug;

use super::{generate_id, Graph};
use crate::element::{Edge, EdgeMeta, EdgeState, Element};
use crate::encoding::{self, validate_id, LABEL_KEY};
use crate::error::{GraphError, Result};
use crate::model::{ElementKind, PropertyValue};

impl Graph {
    /// Creates an edge from `out_id` to `in_id`.
    ///
    /// The edge row is queued first, then the two mirrored adjacency
    /// entries, and everything is flushed together. Endpoints are only
    /// checked when `check_edge_endpoints` is set.
    pub fn add_edge(&self, id: Option<&str>, out_id: &str, in_id: &str, label: &str) -> Result<Edge> {
        if label.is_empty() {
            return Err(GraphError::LabelRequired);
        }
        validate_id(out_id)?;
        validate_id(in_id)?;
        let inner = &self.inner;
        let id = match id {
            Some(id) => {
                validate_id(id)?;
                if !inner.config.skip_existence_checks && inner.edges.exists(id)? {
                    return Err(GraphError::AlreadyExists {
                        kind: ElementKind::Edge,
                        id: id.to_owned(),
                    });
                }
                id.to_owned()
            }
            None => generate_id(),
        };
        if inner.config.check_edge_endpoints {
            for endpoint in [out_id, in_id] {
                if self.load_vertex(endpoint)?.is_none() {
                    return Err(GraphError::not_found(ElementKind::Vertex, endpoint));
                }
            }
        }
        inner.edges.write_edge(&id, label, out_id, in_id)?;
        inner.vertices.write_adjacency(out_id, in_id, &id, label)?;
        inner.writer.checked_flush()?;
        let meta = EdgeMeta {
            label: label.to_owned(),
            out_id: out_id.to_owned(),
            in_id: in_id.to_owned(),
        };
        let state = Arc::new(EdgeState::new(id.clone(), Some(meta)));
        inner.caches.edges.cache(id.clone(), state.clone());
        debug!(edge = %id, tail = out_id, head = in_id, label, "edge added");
        Ok(Edge::new(self.clone(), state))
    }

    /// Looks an edge up by id.
    ///
    /// With existence checks skipped, an uncached id is returned without a
    /// store read; its label and endpoints load on first use.
    pub fn edge(&self, id: &str) -> Result<Option<Edge>> {
        validate_id(id)?;
        let inner = &self.inner;
        if inner.config.skip_existence_checks {
            let state = inner
                .caches
                .edges
                .retrieve(id)
                .unwrap_or_else(|| Arc::new(EdgeState::new(id.to_owned(), None)));
            return Ok(Some(Edge::new(self.clone(), state)));
        }
        self.load_edge(id)
    }

    pub(crate) fn load_edge(&self, id: &str) -> Result<Option<Edge>> {
        let inner = &self.inner;
        if let Some(state) = inner.caches.edges.retrieve(id) {
            return Ok(Some(Edge::new(self.clone(), state)));
        }
        Ok(inner
            .edges
            .read_edge(id, &inner.config.preload_properties)?
            .map(|record| self.edge_handle(record)))
    }

    /// Every live edge, in id order.
    pub fn edges(&self) -> Result<Vec<Edge>> {
        Ok(self
            .inner
            .edges
            .scan_edges()?
            .into_iter()
            .map(|record| self.edge_handle(record))
            .collect())
    }

    /// Edges whose `key` property equals `value`. The key `label`, in any
    /// case, matches the edge label instead of a property.
    pub fn edges_with(&self, key: &str, value: impl Into<PropertyValue>) -> Result<Vec<Edge>> {
        let value = value.into();
        if key.eq_ignore_ascii_case(LABEL_KEY) {
            let label = value.as_str().ok_or_else(|| {
                GraphError::InvalidArgument(format!("edge labels are strings, got {value}"))
            })?;
            return Ok(self
                .inner
                .edges
                .scan_label(label)?
                .into_iter()
                .map(|record| self.edge_handle(record))
                .collect());
        }
        encoding::validate_property_key(key)?;
        if self.is_key_indexed(ElementKind::Edge, key)? {
            let found = self.lookup_indexed(
                ElementKind::Edge,
                self.key_index(ElementKind::Edge),
                key,
                &value,
            )?;
            return Ok(found
                .into_iter()
                .filter_map(|element| match element {
                    Element::Edge(e) => Some(e),
                    Element::Vertex(_) => None,
                })
                .collect());
        }
        debug!(key, "no key index, scanning edge table");
        let mut found = Vec::new();
        for id in self.inner.edges.scan_property(key, &value)? {
            if let Some(edge) = self.load_edge(&id)? {
                found.push(edge);
            }
        }
        Ok(found)
    }

    /// Removes an edge, both adjacency entries, and its index entries.
    ///
    /// Steps: evict from the cache; queue removal of the adjacency entries
    /// on both endpoints, of the edge's key-index entries, and of its
    /// named-index entries, then flush; bulk delete the edge row.
    pub fn remove_edge(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let inner = &self.inner;
        inner.caches.remove(ElementKind::Edge, id);
        let record = inner
            .edges
            .read_full_edge(id)?
            .ok_or_else(|| GraphError::not_found(ElementKind::Edge, id))?;
        if !record.out_id.is_empty() && !record.in_id.is_empty() {
            inner
                .vertices
                .delete_adjacency(&record.out_id, &record.in_id, id)?;
        }
        let policy = self.key_index_policy(ElementKind::Edge)?;
        for (key, raw) in record.raw_properties {
            if policy.covers(&key) {
                inner.edge_key_index.remove_raw(raw, &key, id)?;
            }
        }
        self.remove_from_named_indexes(ElementKind::Edge, id)?;
        inner.writer.checked_flush()?;
        inner.edges.delete_rows([id])?;
        debug!(edge = id, tail = %record.out_id, head = %record.in_id, "edge removed");
        Ok(())
    }
}
