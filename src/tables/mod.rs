//! Typed wrappers over the backing tables of a graph.
//!
//! Reads go straight to the store; writes are queued on the shared
//! [`MutationWriter`] and only become visible to reads once flushed.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::store::{Cell, KvStore, Mutation, RowRange, ScanSpec};
use crate::writer::MutationWriter;

mod edge;
mod element;
mod key_index;
mod metadata;
mod vertex;

pub(crate) use edge::{EdgeRecord, EdgeTable};
pub(crate) use element::ElementTable;
pub(crate) use key_index::KeyIndexTable;
pub(crate) use metadata::{IndexNamesTable, IndexedKeysTable};
pub(crate) use vertex::VertexTable;

/// Handle on one named table plus the shared writer.
#[derive(Clone)]
pub(crate) struct BaseTable {
    store: Arc<dyn KvStore>,
    writer: Arc<MutationWriter>,
    name: String,
    threads: usize,
    authorizations: Arc<[String]>,
}

impl BaseTable {
    pub(crate) fn new(
        store: Arc<dyn KvStore>,
        writer: Arc<MutationWriter>,
        name: String,
        threads: usize,
        authorizations: Arc<[String]>,
    ) -> Self {
        Self {
            store,
            writer,
            name,
            threads,
            authorizations,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn scan(&self, spec: ScanSpec) -> Result<Vec<Cell>> {
        let spec = spec
            .threads(self.threads)
            .authorizations(&self.authorizations);
        Ok(self.store.scan(&self.name, &spec)?)
    }

    pub(crate) fn add_mutation(&self, mutation: Mutation) -> Result<()> {
        self.writer.add_mutation(&self.name, mutation)
    }

    pub(crate) fn add_mutations(&self, mutations: impl IntoIterator<Item = Mutation>) -> Result<()> {
        self.writer.add_mutations(&self.name, mutations)
    }

    /// Bulk delete. Pending writes are flushed first so a queued put can
    /// never land after the delete that was meant to remove it.
    pub(crate) fn delete_ranges(&self, ranges: &[RowRange], families: &[Vec<u8>]) -> Result<usize> {
        if ranges.is_empty() {
            return Ok(0);
        }
        self.writer.checked_flush()?;
        let removed = self.store.delete_ranges(&self.name, ranges, families)?;
        debug!(table = %self.name, ranges = ranges.len(), removed, "bulk delete");
        Ok(removed)
    }
}
