//! Row serialization: the data half of WRITE_ROWS/UPDATE_ROWS/DELETE_ROWS
//! event row images. Each row image is a null bitmap plus the non-null
//! columns' packed values, in schema column order; this module builds that
//! pair from a schema's two source tuples, a direct mirror of a row
//! decoder with the cursor direction reversed.
use crate::bit_set::BitSet;
use crate::column_types::ColumnTypeId;
use crate::errors::SerializeError;
use crate::schema::Schema;
use crate::tuple::{Context, NodeStore};

/// The null bitmap that accompanies a row image: one bit per column, set
/// when that column's value is NULL. A thin, semantically-named wrapper
/// over [`BitSet`] so callers don't need to remember the bit-is-null
/// convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullBitmap(BitSet);

impl NullBitmap {
    pub fn new(column_count: usize) -> Self {
        NullBitmap(BitSet::new(column_count))
    }

    pub fn set_null(&mut self, field_index: usize) {
        self.0.set(field_index);
    }

    pub fn is_null(&self, field_index: usize) -> bool {
        self.0.is_set(field_index)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Which side of a row a column's value comes from, and at what field
/// index within that side's tuple.
enum Source {
    Key(usize),
    Value(usize),
}

/// Computes, for each column in schema order, which tuple it reads from and
/// at what field index: primary-key columns in schema-declared key order
/// from the key tuple (its own independent cursor), everything else from
/// the value tuple; on a keyless schema every column reads from the value
/// tuple offset by one field (field 0 there is the implicit `row_count`).
fn plan_sources<S: Schema + ?Sized>(schema: &S) -> Vec<Source> {
    let columns = schema.columns();
    if schema.is_keyless() {
        return (0..columns.len()).map(|i| Source::Value(i + 1)).collect();
    }

    // The key tuple stores primary-key column values in schema-declared key
    // order (`primary_key_indices()`'s own order), which need not match
    // ascending column index order for a composite key — so the key-tuple
    // field index for column `i` is `i`'s rank within `pk_indices`, not the
    // order columns are encountered while walking 0..n.
    let pk_indices = schema.primary_key_indices();
    let mut value_cursor = 0usize;
    columns
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if let Some(key_idx) = pk_indices.iter().position(|&pk| pk == i) {
                Source::Key(key_idx)
            } else {
                let idx = value_cursor;
                value_cursor += 1;
                Source::Value(idx)
            }
        })
        .collect()
}

/// Serializes one row into a `(data_bytes, null_bitmap)` pair: `data_bytes`
/// contains the concatenated encodings of exactly the non-null columns, in
/// schema order, and a set bit in `null_bitmap` means no bytes were written
/// for that column.
///
/// `key` is the primary-key tuple's raw bytes (ignored, and may be empty,
/// on a keyless schema); `value` is the non-key tuple's raw bytes (on a
/// keyless schema, its field 0 is the implicit `row_count` and is never
/// read as column data).
#[tracing::instrument(level = "trace", skip_all, fields(columns = schema.columns().len()))]
pub fn serialize_row<S: Schema + ?Sized>(
    schema: &S,
    key: &[u8],
    value: &[u8],
    ctx: &Context,
    node_store: Option<&dyn NodeStore>,
) -> Result<(Vec<u8>, NullBitmap), SerializeError> {
    let columns = schema.columns();
    let sources = plan_sources(schema);
    let key_descriptor = schema.key_descriptor();
    let value_descriptor = schema.value_descriptor();

    let mut bitmap = NullBitmap::new(columns.len());
    let mut data = Vec::new();

    for (i, (column, source)) in columns.iter().zip(sources.iter()).enumerate() {
        let type_id: &ColumnTypeId = &column.type_id;
        let (descriptor, tuple, field_index) = match *source {
            Source::Key(idx) => (key_descriptor, key, idx),
            Source::Value(idx) => (value_descriptor, value, idx),
        };
        let packed = type_id.serialize(descriptor, tuple, field_index, ctx, node_store)?;
        match packed {
            None => bitmap.set_null(i),
            Some(bytes) => data.extend_from_slice(&bytes),
        }
    }

    Ok((data, bitmap))
}

/// Convenience wrapper producing the on-wire row image MySQL actually
/// emits: the null bitmap immediately followed by the non-null column
/// values, as [`serialize_row`] returns them split apart.
pub fn serialize_row_image<S: Schema + ?Sized>(
    schema: &S,
    key: &[u8],
    value: &[u8],
    ctx: &Context,
    node_store: Option<&dyn NodeStore>,
) -> Result<Vec<u8>, SerializeError> {
    let (data, bitmap) = serialize_row(schema, key, value, ctx, node_store)?;
    let mut out = bitmap.into_bytes();
    out.extend_from_slice(&data);
    Ok(out)
}
