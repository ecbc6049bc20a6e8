use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::Bound;
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Cell, CellKey, ColumnUpdate, KvStore, Mutation, RowRange, ScanSpec, StoreError, StoreResult};

#[derive(Default)]
struct MemTable {
    cells: BTreeMap<CellKey, Vec<u8>>,
    splits: BTreeSet<Vec<u8>>,
}

impl MemTable {
    fn matching_keys<'a>(
        &'a self,
        range: &'a RowRange,
        filter: impl Fn(&CellKey) -> bool + 'a,
    ) -> impl Iterator<Item = (&'a CellKey, &'a Vec<u8>)> + 'a {
        let lower = match range.start_row() {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(row) | Bound::Excluded(row) => {
                Bound::Included(CellKey::new(row, Vec::new(), Vec::new()))
            }
        };
        self.cells
            .range((lower, Bound::Unbounded))
            .take_while(move |(key, _)| !range.is_past(&key.row))
            .filter(move |(key, _)| range.contains(&key.row) && filter(key))
    }
}

/// In-process sorted store used for tests, tooling, and embedding.
///
/// Every table is a `BTreeMap` keyed by (row, family, qualifier). Writes can
/// be made to fail on demand to exercise partial-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, MemTable>>,
    write_budget: Mutex<Option<usize>>,
}

impl MemoryStore {
    /// Creates an empty store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `writes` more write calls (`apply` or `delete_ranges`) succeed,
    /// then rejects every following one.
    pub fn fail_writes_after(&self, writes: usize) {
        *self.write_budget.lock() = Some(writes);
    }

    /// Rejects every write from now on.
    pub fn reject_writes(&self) {
        self.fail_writes_after(0);
    }

    /// Clears any configured write failure.
    pub fn accept_writes(&self) {
        *self.write_budget.lock() = None;
    }

    /// Number of cells currently stored in `table`; zero if it is missing.
    pub fn cell_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .get(table)
            .map(|t| t.cells.len())
            .unwrap_or(0)
    }

    /// Split points recorded for `table`.
    pub fn splits(&self, table: &str) -> Vec<Vec<u8>> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.splits.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Loads a store from a JSON snapshot written by [`MemoryStore::save_snapshot`].
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            StoreError::Unavailable(format!("read snapshot {}: {err}", path.display()))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_str(&raw)
            .map_err(|err| StoreError::Unavailable(format!("parse snapshot: {err}")))?;
        let mut tables = BTreeMap::new();
        for (name, table) in snapshot.tables {
            let mut mem = MemTable::default();
            for split in table.splits {
                mem.splits.insert(decode_hex(&split)?);
            }
            for cell in table.cells {
                let key = CellKey::new(
                    decode_hex(&cell.row)?,
                    decode_hex(&cell.family)?,
                    decode_hex(&cell.qualifier)?,
                );
                mem.cells.insert(key, decode_hex(&cell.value)?);
            }
            tables.insert(name, mem);
        }
        debug!(path = %path.display(), tables = tables.len(), "memory store loaded");
        Ok(Self {
            tables: RwLock::new(tables),
            write_budget: Mutex::new(None),
        })
    }

    /// Writes every table to a JSON snapshot.
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let tables = self.tables.read();
        let snapshot = StoreSnapshot {
            tables: tables
                .iter()
                .map(|(name, table)| {
                    let cells = table
                        .cells
                        .iter()
                        .map(|(key, value)| CellSnapshot {
                            row: hex::encode(&key.row),
                            family: hex::encode(&key.family),
                            qualifier: hex::encode(&key.qualifier),
                            value: hex::encode(value),
                        })
                        .collect();
                    let splits = table.splits.iter().map(hex::encode).collect();
                    (name.clone(), TableSnapshot { splits, cells })
                })
                .collect(),
        };
        let encoded = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| StoreError::Unavailable(format!("encode snapshot: {err}")))?;
        fs::write(path, encoded).map_err(|err| {
            StoreError::Unavailable(format!("write snapshot {}: {err}", path.display()))
        })
    }

    fn consume_write(&self, table: &str) -> StoreResult<()> {
        let mut budget = self.write_budget.lock();
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(StoreError::Rejected {
                table: table.to_owned(),
                reason: "write rejected by fault injection".into(),
            }),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
        }
    }
}

impl KvStore for MemoryStore {
    fn table_exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    fn create_table(&self, table: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(StoreError::TableExists(table.to_owned()));
        }
        tables.insert(table.to_owned(), MemTable::default());
        Ok(())
    }

    fn delete_table(&self, table: &str) -> StoreResult<()> {
        self.tables
            .write()
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))
    }

    fn list_tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    fn add_splits(&self, table: &str, splits: &[Vec<u8>]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mem = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        mem.splits.extend(splits.iter().cloned());
        Ok(())
    }

    fn scan(&self, table: &str, spec: &ScanSpec) -> StoreResult<Vec<Cell>> {
        let tables = self.tables.read();
        let mem = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        let limit = spec.max_cells().unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for range in spec.row_ranges() {
            for (key, value) in mem.matching_keys(range, |key| spec.matches_columns(key)) {
                if out.len() >= limit {
                    return Ok(out);
                }
                out.push(Cell {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        trace!(
            table,
            cells = out.len(),
            threads = spec.thread_hint(),
            authorizations = spec.scan_authorizations().len(),
            "scan"
        );
        Ok(out)
    }

    fn apply(&self, table: &str, mutations: &[Mutation]) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let mem = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        self.consume_write(table)?;
        for mutation in mutations {
            for update in mutation.updates() {
                match update {
                    ColumnUpdate::Put {
                        family,
                        qualifier,
                        value,
                    } => {
                        let key = CellKey::new(mutation.row(), family.clone(), qualifier.clone());
                        mem.cells.insert(key, value.clone());
                    }
                    ColumnUpdate::Delete { family, qualifier } => {
                        let key = CellKey::new(mutation.row(), family.clone(), qualifier.clone());
                        mem.cells.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn delete_ranges(&self, table: &str, ranges: &[RowRange], families: &[Vec<u8>]) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let mem = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_owned()))?;
        self.consume_write(table)?;
        let mut doomed = Vec::new();
        for range in ranges {
            doomed.extend(
                mem.matching_keys(range, |key| {
                    families.is_empty() || families.iter().any(|f| *f == key.family)
                })
                .map(|(key, _)| key.clone()),
            );
        }
        let mut removed = 0;
        for key in doomed {
            if mem.cells.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Serialize, Deserialize, Default)]
struct StoreSnapshot {
    tables: BTreeMap<String, TableSnapshot>,
}

#[derive(Serialize, Deserialize, Default)]
struct TableSnapshot {
    splits: Vec<String>,
    cells: Vec<CellSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct CellSnapshot {
    row: String,
    family: String,
    qualifier: String,
    value: String,
}

fn decode_hex(raw: &str) -> StoreResult<Vec<u8>> {
    hex::decode(raw).map_err(|err| StoreError::Unavailable(format!("corrupt snapshot: {err}")))
}
