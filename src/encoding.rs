//! Row and column layout of graph elements in the backing store.
//!
//! Element rows are keyed by element id. The existence marker lives at
//! `_LABEL_:_EXISTS_`, an edge label at `_LABEL_:` and every property at
//! `<key>:`. Vertex adjacency sits in the `_OUT_EDGE_` / `_IN_EDGE_`
//! families with a `<other-vertex><DELIM><edge>` qualifier; edge rows use the
//! same families with the endpoint id as qualifier. Key-index rows are keyed
//! by the serialized property value with `<key>:<element-id>` columns.

use std::convert::TryInto;

use crate::error::{GraphError, Result};
use crate::model::{Direction, PropertyValue};

/// Family holding the existence marker and the edge label.
pub const LABEL: &[u8] = b"_LABEL_";
/// Qualifier of the existence marker.
pub const EXISTS: &[u8] = b"_EXISTS_";
/// Family of outgoing adjacency entries.
pub const OUT_EDGE: &[u8] = b"_OUT_EDGE_";
/// Family of incoming adjacency entries.
pub const IN_EDGE: &[u8] = b"_IN_EDGE_";
/// Separator inside composite qualifiers. Never allowed inside ids.
pub const ID_DELIM: &str = "__DELIM__";
/// Empty qualifier and sentinel value.
pub const EMPTY: &[u8] = b"";

/// Property key reserved for element ids.
pub const ID_KEY: &str = "id";
/// Property key that addresses an edge label in lookups.
pub const LABEL_KEY: &str = "label";

const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_LIST: u8 = 0x06;

const SIGN_FLIP_MASK: u64 = 1u64 << 63;

/// Deepest list nesting accepted by the codec in either direction.
pub const MAX_LIST_DEPTH: usize = 64;

/// Serializes a value behind a one-byte type tag.
///
/// Integers are stored big-endian with the sign bit flipped so that encoded
/// key-index rows sort numerically. Floats are canonical: `-0.0` is written
/// as `0.0` and every NaN as [`f64::NAN`], so equal values share one encoding.
pub fn serialize(value: &PropertyValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_value(&mut buf, value, 0)?;
    Ok(buf)
}

/// Inverse of [`serialize`]. Unknown tags and truncated payloads are
/// reported as [`GraphError::Decoding`].
pub fn deserialize(bytes: &[u8]) -> Result<PropertyValue> {
    let mut cursor = Cursor::new(bytes);
    let value = cursor.read_value(0)?;
    cursor.ensure_consumed()?;
    Ok(value)
}

fn write_value(buf: &mut Vec<u8>, value: &PropertyValue, depth: usize) -> Result<()> {
    match value {
        PropertyValue::Bool(v) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*v));
        }
        PropertyValue::Int(v) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&((*v as u64) ^ SIGN_FLIP_MASK).to_be_bytes());
        }
        PropertyValue::Float(v) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&canonical_float(*v).to_be_bytes());
        }
        PropertyValue::String(s) => {
            buf.push(TAG_STRING);
            write_len_prefixed(buf, s.as_bytes())?;
        }
        PropertyValue::Bytes(b) => {
            buf.push(TAG_BYTES);
            write_len_prefixed(buf, b)?;
        }
        PropertyValue::List(items) => {
            if depth >= MAX_LIST_DEPTH {
                return Err(GraphError::Encoding(format!(
                    "lists nested deeper than {MAX_LIST_DEPTH} levels"
                )));
            }
            buf.push(TAG_LIST);
            let count: u32 = items
                .len()
                .try_into()
                .map_err(|_| GraphError::Encoding("list length exceeds u32::MAX".into()))?;
            buf.extend_from_slice(&count.to_be_bytes());
            for item in items {
                write_value(buf, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn canonical_float(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len: u32 = bytes
        .len()
        .try_into()
        .map_err(|_| GraphError::Encoding("payload length exceeds u32::MAX".into()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.index + len > self.data.len() {
            return Err(GraphError::Decoding("unexpected end of value".into()));
        }
        let start = self.index;
        self.index += len;
        Ok(&self.data[start..start + len])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.read_exact(N)?
            .try_into()
            .map_err(|_| GraphError::Decoding("fixed-width field truncated".into()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_exact(len)
    }

    fn read_value(&mut self, depth: usize) -> Result<PropertyValue> {
        let tag = self.read_exact(1)?[0];
        match tag {
            TAG_BOOL => match self.read_exact(1)?[0] {
                0 => Ok(PropertyValue::Bool(false)),
                1 => Ok(PropertyValue::Bool(true)),
                other => Err(GraphError::Decoding(format!(
                    "invalid boolean encoding: {other}"
                ))),
            },
            TAG_INT => {
                let raw = u64::from_be_bytes(self.read_array()?);
                Ok(PropertyValue::Int((raw ^ SIGN_FLIP_MASK) as i64))
            }
            TAG_FLOAT => Ok(PropertyValue::Float(f64::from_be_bytes(self.read_array()?))),
            TAG_STRING => {
                let bytes = self.read_len_prefixed()?;
                String::from_utf8(bytes.to_vec())
                    .map(PropertyValue::String)
                    .map_err(|_| GraphError::Decoding("invalid UTF-8 string".into()))
            }
            TAG_BYTES => Ok(PropertyValue::Bytes(self.read_len_prefixed()?.to_vec())),
            TAG_LIST => {
                if depth >= MAX_LIST_DEPTH {
                    return Err(GraphError::Decoding(format!(
                        "lists nested deeper than {MAX_LIST_DEPTH} levels"
                    )));
                }
                let count = self.read_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.read_value(depth + 1)?);
                }
                Ok(PropertyValue::List(items))
            }
            other => Err(GraphError::Decoding(format!(
                "unknown property value tag: 0x{other:02X}"
            ))),
        }
    }

    fn ensure_consumed(&self) -> Result<()> {
        if self.index != self.data.len() {
            return Err(GraphError::Decoding(
                "unexpected trailing bytes in value".into(),
            ));
        }
        Ok(())
    }
}

/// Rejects ids that are empty or would corrupt composite qualifiers.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(GraphError::InvalidArgument("element id can not be empty".into()));
    }
    if id.contains(ID_DELIM) {
        return Err(GraphError::Encoding(format!(
            "element id {id:?} contains the reserved delimiter {ID_DELIM:?}"
        )));
    }
    Ok(())
}

/// Rejects property keys that collide with ids, labels, or reserved families.
pub fn validate_property_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(GraphError::InvalidArgument("property key can not be empty".into()));
    }
    if key.eq_ignore_ascii_case(ID_KEY) || key.eq_ignore_ascii_case(LABEL_KEY) {
        return Err(GraphError::InvalidArgument(format!(
            "property key {key:?} is reserved"
        )));
    }
    if is_reserved_family(key.as_bytes()) {
        return Err(GraphError::InvalidArgument(format!(
            "property key {key:?} collides with a reserved column family"
        )));
    }
    Ok(())
}

/// Whether a column family is one of the structural families.
pub fn is_reserved_family(family: &[u8]) -> bool {
    family == LABEL || family == OUT_EDGE || family == IN_EDGE
}

/// Whether a cell is the existence marker.
pub fn is_existence_marker(family: &[u8], qualifier: &[u8]) -> bool {
    family == LABEL && qualifier == EXISTS
}

/// Adjacency family for a concrete direction. `Both` has no family of its own.
pub fn direction_family(direction: Direction) -> Option<&'static [u8]> {
    match direction {
        Direction::Out => Some(OUT_EDGE),
        Direction::In => Some(IN_EDGE),
        Direction::Both => None,
    }
}

/// Direction encoded by an adjacency family.
pub fn family_direction(family: &[u8]) -> Option<Direction> {
    if family == OUT_EDGE {
        Some(Direction::Out)
    } else if family == IN_EDGE {
        Some(Direction::In)
    } else {
        None
    }
}

/// The mirrored adjacency family: `_OUT_EDGE_` ↔ `_IN_EDGE_`.
pub fn invert_family(family: &[u8]) -> &'static [u8] {
    if family == IN_EDGE {
        OUT_EDGE
    } else {
        IN_EDGE
    }
}

/// Builds the adjacency qualifier `<other-vertex><DELIM><edge>`.
pub fn adjacency_qualifier(other_vertex: &str, edge: &str) -> Result<Vec<u8>> {
    validate_id(other_vertex)?;
    validate_id(edge)?;
    let mut buf = Vec::with_capacity(other_vertex.len() + ID_DELIM.len() + edge.len());
    buf.extend_from_slice(other_vertex.as_bytes());
    buf.extend_from_slice(ID_DELIM.as_bytes());
    buf.extend_from_slice(edge.as_bytes());
    Ok(buf)
}

/// Splits an adjacency qualifier into `(other-vertex, edge)`.
pub fn split_adjacency_qualifier(qualifier: &[u8]) -> Result<(String, String)> {
    let text = std::str::from_utf8(qualifier)
        .map_err(|_| GraphError::Decoding("adjacency qualifier is not UTF-8".into()))?;
    let (other, edge) = text
        .split_once(ID_DELIM)
        .ok_or_else(|| GraphError::Decoding(format!("malformed adjacency qualifier {text:?}")))?;
    if other.is_empty() || edge.is_empty() {
        return Err(GraphError::Decoding(format!(
            "malformed adjacency qualifier {text:?}"
        )));
    }
    Ok((other.to_owned(), edge.to_owned()))
}

/// Adjacency value: the edge id repeated, followed by the edge label.
pub fn adjacency_value(edge: &str, label: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(edge.len() + ID_DELIM.len() + label.len());
    buf.extend_from_slice(edge.as_bytes());
    buf.extend_from_slice(ID_DELIM.as_bytes());
    buf.extend_from_slice(label.as_bytes());
    buf
}

/// Splits an adjacency value into `(edge, label)`.
pub fn split_adjacency_value(value: &[u8]) -> Result<(String, String)> {
    let text = std::str::from_utf8(value)
        .map_err(|_| GraphError::Decoding("adjacency value is not UTF-8".into()))?;
    let (edge, label) = text
        .split_once(ID_DELIM)
        .ok_or_else(|| GraphError::Decoding(format!("malformed adjacency value {text:?}")))?;
    Ok((edge.to_owned(), label.to_owned()))
}

/// Decodes a row key or qualifier that carries an element id.
pub fn decode_id(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| GraphError::Decoding("element id is not UTF-8".into()))
}
