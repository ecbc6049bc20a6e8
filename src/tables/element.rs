use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::BaseTable;
use crate::encoding::{self, EMPTY, EXISTS, LABEL};
use crate::error::Result;
use crate::model::PropertyValue;
use crate::store::{Cell, Mutation, RowRange, ScanSpec};

/// Property and existence operations shared by the vertex and edge tables.
///
/// None of these touch the key index; callers keep it in step.
#[derive(Clone)]
pub(crate) struct ElementTable {
    base: BaseTable,
}

impl ElementTable {
    pub(crate) fn new(base: BaseTable) -> Self {
        Self { base }
    }

    pub(crate) fn base(&self) -> &BaseTable {
        &self.base
    }

    /// Point lookup of a single property.
    pub(crate) fn read_property(&self, id: &str, key: &str) -> Result<Option<PropertyValue>> {
        let spec = ScanSpec::range(RowRange::exact(id)).fetch_column(key.as_bytes(), EMPTY);
        match self.base.scan(spec)?.first() {
            Some(cell) => Ok(Some(encoding::deserialize(&cell.value)?)),
            None => Ok(None),
        }
    }

    /// Reads the existence marker and the listed properties in one scan.
    /// `None` means the element is not live; an empty map means it has none
    /// of the requested properties.
    pub(crate) fn read_properties(
        &self,
        id: &str,
        keys: &[String],
    ) -> Result<Option<FxHashMap<String, PropertyValue>>> {
        let mut spec = ScanSpec::range(RowRange::exact(id)).fetch_column(LABEL, EXISTS);
        for key in keys.iter().filter(|k| !encoding::is_reserved_family(k.as_bytes())) {
            spec = spec.fetch_column(key.as_bytes(), EMPTY);
        }
        let mut exists = false;
        let mut props = FxHashMap::default();
        for cell in self.base.scan(spec)? {
            if encoding::is_existence_marker(&cell.key.family, &cell.key.qualifier) {
                exists = true;
            } else {
                let key = encoding::decode_id(&cell.key.family)?;
                props.insert(key, encoding::deserialize(&cell.value)?);
            }
        }
        Ok(exists.then_some(props))
    }

    /// Keys of every property on the row, structural families excluded.
    pub(crate) fn read_property_keys(&self, id: &str) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        for cell in self.row_cells(id)? {
            if !encoding::is_reserved_family(&cell.key.family) {
                keys.insert(encoding::decode_id(&cell.key.family)?);
            }
        }
        Ok(keys)
    }

    pub(crate) fn write_property(&self, id: &str, key: &str, value: &PropertyValue) -> Result<()> {
        let mut mutation = Mutation::new(id);
        mutation.put(key.as_bytes(), EMPTY, encoding::serialize(value)?);
        self.base.add_mutation(mutation)
    }

    pub(crate) fn clear_property(&self, id: &str, key: &str) -> Result<()> {
        let mut mutation = Mutation::new(id);
        mutation.delete(key.as_bytes(), EMPTY);
        self.base.add_mutation(mutation)
    }

    pub(crate) fn write_existence(&self, mutation: &mut Mutation) {
        mutation.put(LABEL, EXISTS, EMPTY);
    }

    pub(crate) fn exists(&self, id: &str) -> Result<bool> {
        let spec = ScanSpec::range(RowRange::exact(id))
            .fetch_column(LABEL, EXISTS)
            .limit(1);
        Ok(!self.base.scan(spec)?.is_empty())
    }

    /// Every cell of one row.
    pub(crate) fn row_cells(&self, id: &str) -> Result<Vec<Cell>> {
        self.base.scan(ScanSpec::range(RowRange::exact(id)))
    }

    /// Ids of every live element, in row order.
    pub(crate) fn scan_ids(&self) -> Result<Vec<String>> {
        self.base
            .scan(ScanSpec::range(RowRange::All).fetch_column(LABEL, EXISTS))?
            .iter()
            .map(|cell| encoding::decode_id(&cell.key.row))
            .collect()
    }

    /// Whether the table holds no live element.
    pub(crate) fn is_empty(&self) -> Result<bool> {
        let spec = ScanSpec::range(RowRange::All)
            .fetch_column(LABEL, EXISTS)
            .limit(1);
        Ok(self.base.scan(spec)?.is_empty())
    }

    /// `(id, serialized value)` for every live element carrying `key`.
    /// Rows without the existence marker are skipped.
    pub(crate) fn scan_property_raw(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let spec = ScanSpec::range(RowRange::All)
            .fetch_column(LABEL, EXISTS)
            .fetch_column(key.as_bytes(), EMPTY);
        let mut found = Vec::new();
        let mut current: Option<RowProbe> = None;
        for cell in self.base.scan(spec)? {
            if current.as_ref().map_or(true, |row| row.row != cell.key.row) {
                if let Some(done) = current.take() {
                    done.collect_into(&mut found)?;
                }
                current = Some(RowProbe {
                    row: cell.key.row.clone(),
                    live: false,
                    value: None,
                });
            }
            if let Some(row) = current.as_mut() {
                if encoding::is_existence_marker(&cell.key.family, &cell.key.qualifier) {
                    row.live = true;
                } else {
                    row.value = Some(cell.value);
                }
            }
        }
        if let Some(done) = current {
            done.collect_into(&mut found)?;
        }
        Ok(found)
    }

    /// Full-scan fallback of a key/value lookup. Matches on the canonical
    /// encoding, the same bytes the key index is keyed by.
    pub(crate) fn scan_property(&self, key: &str, value: &PropertyValue) -> Result<Vec<String>> {
        let wanted = encoding::serialize(value)?;
        Ok(self
            .scan_property_raw(key)?
            .into_iter()
            .filter(|(_, raw)| *raw == wanted)
            .map(|(id, _)| id)
            .collect())
    }

    /// Removes whole rows.
    pub(crate) fn delete_rows<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<usize> {
        let ranges: Vec<RowRange> = ids.into_iter().map(RowRange::exact).collect();
        self.base.delete_ranges(&ranges, &[])
    }
}

/// Marker and property cell of one row, gathered while scanning. The marker
/// family does not necessarily sort first within the row.
struct RowProbe {
    row: Vec<u8>,
    live: bool,
    value: Option<Vec<u8>>,
}

impl RowProbe {
    fn collect_into(self, found: &mut Vec<(String, Vec<u8>)>) -> Result<()> {
        if let (true, Some(value)) = (self.live, self.value) {
            found.push((encoding::decode_id(&self.row)?, value));
        }
        Ok(())
    }
}
