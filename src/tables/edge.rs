use std::ops::Deref;

use rustc_hash::FxHashMap;

use super::{BaseTable, ElementTable};
use crate::encoding::{self, EMPTY, IN_EDGE, LABEL, OUT_EDGE};
use crate::error::{GraphError, Result};
use crate::model::PropertyValue;
use crate::store::{Cell, Mutation, RowRange, ScanSpec};

/// Structural part of an edge row plus whatever properties were fetched.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EdgeRecord {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) out_id: String,
    pub(crate) in_id: String,
    pub(crate) properties: FxHashMap<String, PropertyValue>,
    /// Serialized values as stored, for key-index cleanup.
    pub(crate) raw_properties: Vec<(String, Vec<u8>)>,
}

/// Edge rows: existence, label, endpoints, and properties.
#[derive(Clone)]
pub(crate) struct EdgeTable {
    rows: ElementTable,
}

impl Deref for EdgeTable {
    type Target = ElementTable;

    fn deref(&self) -> &ElementTable {
        &self.rows
    }
}

impl EdgeTable {
    pub(crate) fn new(base: BaseTable) -> Self {
        Self {
            rows: ElementTable::new(base),
        }
    }

    /// Queues the edge row: existence marker, label, and both endpoints.
    pub(crate) fn write_edge(&self, id: &str, label: &str, out_id: &str, in_id: &str) -> Result<()> {
        let mut mutation = Mutation::new(id);
        self.rows.write_existence(&mut mutation);
        mutation
            .put(LABEL, EMPTY, encoding::serialize(&PropertyValue::from(label))?)
            .put(OUT_EDGE, out_id.as_bytes(), EMPTY)
            .put(IN_EDGE, in_id.as_bytes(), EMPTY);
        self.base().add_mutation(mutation)
    }

    /// Reads the structural columns and the listed properties of one edge.
    /// `None` when the existence marker is missing.
    pub(crate) fn read_edge(&self, id: &str, preload: &[String]) -> Result<Option<EdgeRecord>> {
        let mut spec = ScanSpec::range(RowRange::exact(id))
            .fetch_family(LABEL)
            .fetch_family(OUT_EDGE)
            .fetch_family(IN_EDGE);
        for key in preload.iter().filter(|k| !encoding::is_reserved_family(k.as_bytes())) {
            spec = spec.fetch_column(key.as_bytes(), EMPTY);
        }
        let cells = self.base().scan(spec)?;
        Ok(collect_records(cells)?.into_iter().next())
    }

    /// Every cell of the edge row, parsed. `None` when the row is empty.
    pub(crate) fn read_full_edge(&self, id: &str) -> Result<Option<EdgeRecord>> {
        let cells = self.row_cells(id)?;
        if cells.is_empty() {
            return Ok(None);
        }
        let mut record = EdgeRecord {
            id: id.to_owned(),
            ..EdgeRecord::default()
        };
        for cell in &cells {
            apply_cell(&mut record, cell)?;
        }
        Ok(Some(record))
    }

    /// Structural columns of every live edge.
    pub(crate) fn scan_edges(&self) -> Result<Vec<EdgeRecord>> {
        let spec = ScanSpec::range(RowRange::All)
            .fetch_family(LABEL)
            .fetch_family(OUT_EDGE)
            .fetch_family(IN_EDGE);
        collect_records(self.base().scan(spec)?)
    }

    /// Live edges whose label equals `label`.
    pub(crate) fn scan_label(&self, label: &str) -> Result<Vec<EdgeRecord>> {
        Ok(self
            .scan_edges()?
            .into_iter()
            .filter(|record| record.label == label)
            .collect())
    }
}

/// Groups row-ordered cells into records, dropping rows without an
/// existence marker.
fn collect_records(cells: Vec<Cell>) -> Result<Vec<EdgeRecord>> {
    let mut records = Vec::new();
    let mut current: Option<(EdgeRecord, bool)> = None;
    for cell in &cells {
        let starts_row = current
            .as_ref()
            .map_or(true, |(record, _)| record.id.as_bytes() != cell.key.row.as_slice());
        if starts_row {
            if let Some((record, true)) = current.take() {
                records.push(record);
            }
            let record = EdgeRecord {
                id: encoding::decode_id(&cell.key.row)?,
                ..EdgeRecord::default()
            };
            current = Some((record, false));
        }
        if let Some((record, live)) = current.as_mut() {
            if encoding::is_existence_marker(&cell.key.family, &cell.key.qualifier) {
                *live = true;
            }
            apply_cell(record, cell)?;
        }
    }
    if let Some((record, true)) = current {
        records.push(record);
    }
    Ok(records)
}

fn apply_cell(record: &mut EdgeRecord, cell: &Cell) -> Result<()> {
    let family = cell.key.family.as_slice();
    if family == LABEL {
        if cell.key.qualifier == EMPTY {
            record.label = match encoding::deserialize(&cell.value)? {
                PropertyValue::String(label) => label,
                other => {
                    return Err(GraphError::Decoding(format!(
                        "edge {} has a non-string label {other}",
                        record.id
                    )))
                }
            };
        }
    } else if family == OUT_EDGE {
        record.out_id = encoding::decode_id(&cell.key.qualifier)?;
    } else if family == IN_EDGE {
        record.in_id = encoding::decode_id(&cell.key.qualifier)?;
    } else {
        let key = encoding::decode_id(family)?;
        record
            .properties
            .insert(key.clone(), encoding::deserialize(&cell.value)?);
        record.raw_properties.push((key, cell.value.clone()));
    }
    Ok(())
}
