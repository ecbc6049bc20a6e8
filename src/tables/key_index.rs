use super::BaseTable;
use crate::encoding::{self, EMPTY};
use crate::error::Result;
use crate::model::PropertyValue;
use crate::store::{Mutation, RowRange, ScanSpec};

/// Value-keyed index table: row = serialized value, family = property key,
/// qualifier = element id. Backs both the automatic key indexes and every
/// named index.
#[derive(Clone)]
pub(crate) struct KeyIndexTable {
    base: BaseTable,
}

impl KeyIndexTable {
    pub(crate) fn new(base: BaseTable) -> Self {
        Self { base }
    }

    pub(crate) fn name(&self) -> &str {
        self.base.name()
    }

    pub(crate) fn put_entry(&self, key: &str, value: &PropertyValue, id: &str) -> Result<()> {
        self.put_raw(encoding::serialize(value)?, key, id)
    }

    pub(crate) fn put_raw(&self, row: Vec<u8>, key: &str, id: &str) -> Result<()> {
        let mut mutation = Mutation::new(row);
        mutation.put(key.as_bytes(), id.as_bytes(), EMPTY);
        self.base.add_mutation(mutation)
    }

    pub(crate) fn remove_entry(&self, key: &str, value: &PropertyValue, id: &str) -> Result<()> {
        self.remove_raw(encoding::serialize(value)?, key, id)
    }

    pub(crate) fn remove_raw(&self, row: Vec<u8>, key: &str, id: &str) -> Result<()> {
        let mut mutation = Mutation::new(row);
        mutation.delete(key.as_bytes(), id.as_bytes());
        self.base.add_mutation(mutation)
    }

    /// Element ids indexed under `key` = `value`, in id order.
    pub(crate) fn lookup(&self, key: &str, value: &PropertyValue) -> Result<Vec<String>> {
        let spec = ScanSpec::range(RowRange::exact(encoding::serialize(value)?))
            .fetch_family(key.as_bytes());
        self.base
            .scan(spec)?
            .iter()
            .map(|cell| encoding::decode_id(&cell.key.qualifier))
            .collect()
    }

    /// Drops every entry of `key`. Entries are scattered by value, so this is
    /// a whole-table delete filtered by family.
    pub(crate) fn drop_key(&self, key: &str) -> Result<usize> {
        self.base
            .delete_ranges(&[RowRange::All], &[key.as_bytes().to_vec()])
    }

    /// Queues removal of every entry pointing at `id`, whatever key and
    /// value it sits under. Returns the number of entries found.
    pub(crate) fn remove_element(&self, id: &str) -> Result<usize> {
        let doomed: Vec<Mutation> = self
            .base
            .scan(ScanSpec::range(RowRange::All))?
            .into_iter()
            .filter(|cell| cell.key.qualifier == id.as_bytes())
            .map(|cell| {
                let mut mutation = Mutation::new(cell.key.row);
                mutation.delete(&cell.key.family, &cell.key.qualifier);
                mutation
            })
            .collect();
        let count = doomed.len();
        self.base.add_mutations(doomed)?;
        Ok(count)
    }
}
