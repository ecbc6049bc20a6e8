use std::ops::Deref;

use super::{BaseTable, ElementTable};
use crate::encoding::{self, IN_EDGE, OUT_EDGE};
use crate::error::Result;
use crate::model::Direction;
use crate::store::{Mutation, RowRange, ScanSpec};

/// One adjacency entry read from a vertex row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AdjacencyEntry {
    pub(crate) direction: Direction,
    pub(crate) other: String,
    pub(crate) edge: String,
    pub(crate) label: String,
}

/// Vertex rows: existence, properties, and mirrored adjacency entries.
#[derive(Clone)]
pub(crate) struct VertexTable {
    rows: ElementTable,
}

impl Deref for VertexTable {
    type Target = ElementTable;

    fn deref(&self) -> &ElementTable {
        &self.rows
    }
}

impl VertexTable {
    pub(crate) fn new(base: BaseTable) -> Self {
        Self {
            rows: ElementTable::new(base),
        }
    }

    pub(crate) fn write_vertex(&self, id: &str) -> Result<()> {
        let mut mutation = Mutation::new(id);
        self.rows.write_existence(&mut mutation);
        self.base().add_mutation(mutation)
    }

    /// Queues the two mirrored entries of an edge: `_OUT_EDGE_` on the tail,
    /// `_IN_EDGE_` on the head.
    pub(crate) fn write_adjacency(&self, out_id: &str, in_id: &str, edge: &str, label: &str) -> Result<()> {
        let value = encoding::adjacency_value(edge, label);
        let mut tail = Mutation::new(out_id);
        tail.put(OUT_EDGE, &encoding::adjacency_qualifier(in_id, edge)?, value.clone());
        let mut head = Mutation::new(in_id);
        head.put(IN_EDGE, &encoding::adjacency_qualifier(out_id, edge)?, value);
        self.base().add_mutations([tail, head])
    }

    /// Queues removal of both mirrored entries of an edge.
    pub(crate) fn delete_adjacency(&self, out_id: &str, in_id: &str, edge: &str) -> Result<()> {
        let mut tail = Mutation::new(out_id);
        tail.delete(OUT_EDGE, &encoding::adjacency_qualifier(in_id, edge)?);
        let mut head = Mutation::new(in_id);
        head.delete(IN_EDGE, &encoding::adjacency_qualifier(out_id, edge)?);
        self.base().add_mutations([tail, head])
    }

    /// Queues removal of the entry on `other` that mirrors an entry found on
    /// `vertex` under `family`.
    pub(crate) fn delete_mirrored(&self, vertex: &str, family: &[u8], other: &str, edge: &str) -> Result<()> {
        let mut mutation = Mutation::new(other);
        mutation.delete(
            encoding::invert_family(family),
            &encoding::adjacency_qualifier(vertex, edge)?,
        );
        self.base().add_mutation(mutation)
    }

    /// Adjacency entries of `id` in `direction`, optionally restricted to
    /// `labels`.
    pub(crate) fn adjacency(&self, id: &str, direction: Direction, labels: &[&str]) -> Result<Vec<AdjacencyEntry>> {
        let mut spec = ScanSpec::range(RowRange::exact(id));
        for dir in [Direction::Out, Direction::In] {
            if direction.includes(dir) {
                if let Some(family) = encoding::direction_family(dir) {
                    spec = spec.fetch_family(family);
                }
            }
        }
        let mut entries = Vec::new();
        for cell in self.base().scan(spec)? {
            let Some(direction) = encoding::family_direction(&cell.key.family) else {
                continue;
            };
            let (other, edge) = encoding::split_adjacency_qualifier(&cell.key.qualifier)?;
            let (_, label) = encoding::split_adjacency_value(&cell.value)?;
            if !labels.is_empty() && !labels.contains(&label.as_str()) {
                continue;
            }
            entries.push(AdjacencyEntry {
                direction,
                other,
                edge,
                label,
            });
        }
        Ok(entries)
    }
}
