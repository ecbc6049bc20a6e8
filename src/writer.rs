use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{GraphError, Result};
use crate::store::{KvStore, Mutation, StoreError};

#[derive(Default)]
struct PendingBatch {
    tables: Vec<(String, Vec<Mutation>)>,
    count: usize,
}

impl PendingBatch {
    fn push(&mut self, table: &str, mutation: Mutation) {
        match self.tables.iter_mut().find(|(name, _)| name == table) {
            Some((_, queue)) => queue.push(mutation),
            None => self.tables.push((table.to_owned(), vec![mutation])),
        }
        self.count += 1;
    }
}

/// Buffered writer shared by every table of a graph.
///
/// Mutations are queued per table in submission order and sent to the store
/// on [`MutationWriter::checked_flush`] or once the buffer reaches its limit.
/// Tables are flushed in the order they first received a mutation. A
/// rejected batch is dropped and reported; nothing is retried.
pub struct MutationWriter {
    store: Arc<dyn KvStore>,
    max_buffered: usize,
    pending: Mutex<PendingBatch>,
}

impl MutationWriter {
    /// Creates a writer that flushes automatically after `max_buffered` mutations.
    pub fn new(store: Arc<dyn KvStore>, max_buffered: usize) -> Self {
        Self {
            store,
            max_buffered: max_buffered.max(1),
            pending: Mutex::new(PendingBatch::default()),
        }
    }

    /// Queues a mutation for `table`. Empty mutations are ignored.
    pub fn add_mutation(&self, table: &str, mutation: Mutation) -> Result<()> {
        if mutation.is_empty() {
            return Ok(());
        }
        let mut pending = self.pending.lock();
        pending.push(table, mutation);
        if pending.count >= self.max_buffered {
            trace!(buffered = pending.count, "buffer limit reached");
            return self.flush_locked(&mut pending);
        }
        Ok(())
    }

    /// Queues several mutations for `table`.
    pub fn add_mutations<I>(&self, table: &str, mutations: I) -> Result<()>
    where
        I: IntoIterator<Item = Mutation>,
    {
        for mutation in mutations {
            self.add_mutation(table, mutation)?;
        }
        Ok(())
    }

    /// Number of queued mutations.
    pub fn pending(&self) -> usize {
        self.pending.lock().count
    }

    /// Applies every queued mutation, surfacing a rejected batch as
    /// [`GraphError::MutationsRejected`].
    pub fn checked_flush(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        self.flush_locked(&mut pending)
    }

    /// Flushes the remaining mutations before the writer is dropped.
    pub fn close(&self) -> Result<()> {
        self.checked_flush()
    }

    fn flush_locked(&self, pending: &mut PendingBatch) -> Result<()> {
        if pending.count == 0 {
            return Ok(());
        }
        let batch = std::mem::take(pending);
        trace!(mutations = batch.count, tables = batch.tables.len(), "flushing");
        for (table, mutations) in batch.tables {
            if let Err(err) = self.store.apply(&table, &mutations) {
                let reason = match err {
                    StoreError::Rejected { reason, .. } => reason,
                    other => other.to_string(),
                };
                warn!(table = %table, count = mutations.len(), %reason, "mutation batch rejected");
                return Err(GraphError::MutationsRejected {
                    table,
                    count: mutations.len(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
