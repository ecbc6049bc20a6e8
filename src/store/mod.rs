//! Seam to the backing sorted key-value store.
//!
//! The mapping layer only ever talks to a [`KvStore`]: ranged scans with
//! column filters, per-row mutation batches, and bulk ranged deletes. Rows,
//! column families, and qualifiers are plain byte strings sorted
//! lexicographically in that order.

use std::ops::Bound;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table does not exist.
    #[error("table {0} does not exist")]
    TableNotFound(String),
    /// The table already exists.
    #[error("table {0} already exists")]
    TableExists(String),
    /// A write batch was refused by the server.
    #[error("table {table} rejected mutations: {reason}")]
    Rejected {
        /// Target table.
        table: String,
        /// Server-provided reason.
        reason: String,
    },
    /// The store could not be reached or the request was malformed.
    #[error("{0}")]
    Unavailable(String),
}

/// Fully qualified cell coordinate. Ordering is row, then family, then qualifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Row key.
    pub row: Vec<u8>,
    /// Column family.
    pub family: Vec<u8>,
    /// Column qualifier.
    pub qualifier: Vec<u8>,
}

impl CellKey {
    /// Builds a key from its three parts.
    pub fn new(row: impl Into<Vec<u8>>, family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }
}

/// A stored cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Coordinate of the cell.
    pub key: CellKey,
    /// Stored value.
    pub value: Vec<u8>,
}

/// Single column change within a [`Mutation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnUpdate {
    /// Insert or overwrite a cell.
    Put {
        /// Column family.
        family: Vec<u8>,
        /// Column qualifier.
        qualifier: Vec<u8>,
        /// New value.
        value: Vec<u8>,
    },
    /// Remove a cell if present.
    Delete {
        /// Column family.
        family: Vec<u8>,
        /// Column qualifier.
        qualifier: Vec<u8>,
    },
}

/// Ordered set of column updates against one row. The store applies a
/// mutation atomically; nothing spans rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    row: Vec<u8>,
    updates: Vec<ColumnUpdate>,
}

impl Mutation {
    /// Starts an empty mutation on `row`.
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            updates: Vec::new(),
        }
    }

    /// Queues a put.
    pub fn put(&mut self, family: &[u8], qualifier: &[u8], value: impl Into<Vec<u8>>) -> &mut Self {
        self.updates.push(ColumnUpdate::Put {
            family: family.to_vec(),
            qualifier: qualifier.to_vec(),
            value: value.into(),
        });
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, family: &[u8], qualifier: &[u8]) -> &mut Self {
        self.updates.push(ColumnUpdate::Delete {
            family: family.to_vec(),
            qualifier: qualifier.to_vec(),
        });
        self
    }

    /// Row targeted by this mutation.
    pub fn row(&self) -> &[u8] {
        &self.row
    }

    /// Queued updates in submission order.
    pub fn updates(&self) -> &[ColumnUpdate] {
        &self.updates
    }

    /// Returns true when no update is queued.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Range of rows a scan or bulk delete covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowRange {
    /// Every row in the table.
    All,
    /// Exactly one row.
    Exact(Vec<u8>),
    /// Rows starting with the prefix.
    Prefix(Vec<u8>),
    /// Rows between two bounds.
    Between {
        /// Lower bound.
        start: Bound<Vec<u8>>,
        /// Upper bound.
        end: Bound<Vec<u8>>,
    },
}

impl RowRange {
    /// Single-row range.
    pub fn exact(row: impl Into<Vec<u8>>) -> Self {
        RowRange::Exact(row.into())
    }

    /// Smallest row that may fall inside the range.
    pub fn start_row(&self) -> Bound<&[u8]> {
        match self {
            RowRange::All => Bound::Unbounded,
            RowRange::Exact(row) | RowRange::Prefix(row) => Bound::Included(row.as_slice()),
            RowRange::Between { start, .. } => match start {
                Bound::Included(row) => Bound::Included(row.as_slice()),
                Bound::Excluded(row) => Bound::Excluded(row.as_slice()),
                Bound::Unbounded => Bound::Unbounded,
            },
        }
    }

    /// Whether `row` lies inside the range.
    pub fn contains(&self, row: &[u8]) -> bool {
        match self {
            RowRange::All => true,
            RowRange::Exact(target) => row == target.as_slice(),
            RowRange::Prefix(prefix) => row.starts_with(prefix),
            RowRange::Between { start, end } => {
                let lower = match start {
                    Bound::Included(s) => row >= s.as_slice(),
                    Bound::Excluded(s) => row > s.as_slice(),
                    Bound::Unbounded => true,
                };
                lower && !self.is_past(row)
            }
        }
    }

    /// Whether `row` sorts after every row in the range.
    pub fn is_past(&self, row: &[u8]) -> bool {
        match self {
            RowRange::All => false,
            RowRange::Exact(target) => row > target.as_slice(),
            RowRange::Prefix(prefix) => !row.starts_with(prefix) && row > prefix.as_slice(),
            RowRange::Between { end, .. } => match end {
                Bound::Included(e) => row > e.as_slice(),
                Bound::Excluded(e) => row >= e.as_slice(),
                Bound::Unbounded => false,
            },
        }
    }
}

/// Scan request: row ranges plus optional column fetch filters.
///
/// A cell passes the column filter when no filter is set, when its family is
/// one of the fetched families, or when its (family, qualifier) pair is one of
/// the fetched columns.
#[derive(Clone, Debug, Default)]
pub struct ScanSpec {
    ranges: Vec<RowRange>,
    families: Vec<Vec<u8>>,
    columns: Vec<(Vec<u8>, Vec<u8>)>,
    limit: Option<usize>,
    threads: usize,
    authorizations: Vec<String>,
}

impl ScanSpec {
    /// Scan over a single range.
    pub fn range(range: RowRange) -> Self {
        Self {
            ranges: vec![range],
            ..Self::default()
        }
    }

    /// Batch scan over several ranges.
    pub fn ranges(ranges: Vec<RowRange>) -> Self {
        Self {
            ranges,
            ..Self::default()
        }
    }

    /// Restricts the scan to a column family.
    pub fn fetch_family(mut self, family: &[u8]) -> Self {
        self.families.push(family.to_vec());
        self
    }

    /// Restricts the scan to a single column.
    pub fn fetch_column(mut self, family: &[u8], qualifier: &[u8]) -> Self {
        self.columns.push((family.to_vec(), qualifier.to_vec()));
        self
    }

    /// Stops after `limit` matching cells.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parallelism hint for stores that fan batch scans out.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Visibility labels the scan runs with.
    pub fn authorizations(mut self, authorizations: &[String]) -> Self {
        self.authorizations = authorizations.to_vec();
        self
    }

    /// Row ranges covered. An empty list covers nothing.
    pub fn row_ranges(&self) -> &[RowRange] {
        &self.ranges
    }

    /// Maximum number of cells to return.
    pub fn max_cells(&self) -> Option<usize> {
        self.limit
    }

    /// Parallelism hint; zero means the store default.
    pub fn thread_hint(&self) -> usize {
        self.threads
    }

    /// Visibility labels; stores without cell visibility ignore them.
    pub fn scan_authorizations(&self) -> &[String] {
        &self.authorizations
    }

    /// Applies the column filter to a key.
    pub fn matches_columns(&self, key: &CellKey) -> bool {
        if self.families.is_empty() && self.columns.is_empty() {
            return true;
        }
        self.families.iter().any(|f| *f == key.family)
            || self
                .columns
                .iter()
                .any(|(f, q)| *f == key.family && *q == key.qualifier)
    }
}

/// Client interface of the backing store.
///
/// Implementations must be safe to share across threads; every call is a
/// synchronous round trip.
pub trait KvStore: Send + Sync {
    /// Returns whether the table exists.
    fn table_exists(&self, table: &str) -> bool;

    /// Creates an empty table.
    fn create_table(&self, table: &str) -> StoreResult<()>;

    /// Drops a table and all of its cells.
    fn delete_table(&self, table: &str) -> StoreResult<()>;

    /// Lists table names in sorted order.
    fn list_tables(&self) -> Vec<String>;

    /// Pre-splits a table at the given rows.
    fn add_splits(&self, table: &str, splits: &[Vec<u8>]) -> StoreResult<()>;

    /// Returns matching cells in key order.
    fn scan(&self, table: &str, spec: &ScanSpec) -> StoreResult<Vec<Cell>>;

    /// Applies a batch of row mutations. Each row is atomic; the batch is not.
    fn apply(&self, table: &str, mutations: &[Mutation]) -> StoreResult<()>;

    /// Deletes every cell inside `ranges` whose family is listed in
    /// `families` (all families when empty). Returns the number of cells
    /// removed.
    fn delete_ranges(&self, table: &str, ranges: &[RowRange], families: &[Vec<u8>]) -> StoreResult<usize>;
}
