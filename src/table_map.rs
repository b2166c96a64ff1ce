//! TABLE_MAP event construction: the column-type and metadata header that
//! every WRITE_ROWS/UPDATE_ROWS/DELETE_ROWS event for a table is preceded
//! by, so the row images can be decoded without re-describing their own
//! layout.
use crate::bit_set::BitSet;
use crate::errors::SerializeError;
use crate::packet_helpers::{write_one_byte_length_prefixed, write_uint24_le};
use crate::schema::Schema;

/// A fully-built TABLE_MAP event body, ready to be framed by the caller's
/// binlog event header and checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMap {
    pub table_id: u64,
    pub flags: u16,
    pub database_name: String,
    pub table_name: String,
    pub column_types: Vec<u8>,
    pub column_metadata: Vec<u8>,
    pub can_be_null: BitSet,
}

impl TableMap {
    /// Serializes this TABLE_MAP to its wire form: 6-byte table id, 2-byte
    /// flags, length-prefixed database and table names, a length-prefixed
    /// column-count and column-type array, a length-prefixed metadata
    /// block, and the null-bitmap tail.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_uint24_le(&mut buf, (self.table_id & 0xFFFFFF) as u32);
        write_uint24_le(&mut buf, ((self.table_id >> 24) & 0xFFFFFF) as u32);
        buf.push((self.flags & 0xFF) as u8);
        buf.push(((self.flags >> 8) & 0xFF) as u8);

        write_one_byte_length_prefixed(&mut buf, self.database_name.as_bytes());
        buf.push(0); // NUL terminator, matching MySQL's null-terminated schema name
        write_one_byte_length_prefixed(&mut buf, self.table_name.as_bytes());
        buf.push(0);

        write_length_encoded_int(&mut buf, self.column_types.len() as u64);
        buf.extend_from_slice(&self.column_types);

        write_length_encoded_int(&mut buf, self.column_metadata.len() as u64);
        buf.extend_from_slice(&self.column_metadata);

        buf.extend_from_slice(self.can_be_null.as_bytes());
        buf
    }
}

/// MySQL's packet length-encoded integer: single byte for values below
/// 251, with 0xFB..0xFE lead bytes selecting 2/3/8-byte bodies for larger
/// ones. TABLE_MAP's column-count and metadata-block-length fields use
/// this encoding rather than the fixed-width prefixes `packet_helpers`
/// otherwise provides.
fn write_length_encoded_int(buf: &mut Vec<u8>, value: u64) {
    if value < 251 {
        buf.push(value as u8);
    } else if value < 0x1_0000 {
        buf.push(0xFC);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value < 0x100_0000 {
        buf.push(0xFD);
        write_uint24_le(buf, value as u32);
    } else {
        buf.push(0xFE);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

/// Builds the TABLE_MAP event body for `schema`, covering every column in
/// `schema.columns()` order (key columns included; TABLE_MAP describes the
/// whole row layout, not just the primary key).
#[tracing::instrument(level = "trace", skip_all, fields(table_id, columns = schema.columns().len()))]
pub fn build_table_map<S: Schema + ?Sized>(
    schema: &S,
    table_id: u64,
    database_name: impl Into<String>,
    table_name: impl Into<String>,
) -> Result<TableMap, SerializeError> {
    let columns = schema.columns();
    let mut column_types = Vec::with_capacity(columns.len());
    let mut column_metadata = Vec::new();
    let mut can_be_null = BitSet::new(columns.len());

    for (i, column) in columns.iter().enumerate() {
        column_types.push(column.type_id.wire_type());
        column_metadata.extend_from_slice(&column.type_id.metadata());
        if column.nullable {
            can_be_null.set(i);
        }
    }

    Ok(TableMap {
        table_id,
        flags: 0,
        database_name: database_name.into(),
        table_name: table_name.into(),
        column_types,
        column_metadata,
        can_be_null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::column_types::ColumnTypeId;
    use crate::schema::Column;
    use crate::tuple::TupleDescriptor;

    struct EmptyDescriptor;
    impl TupleDescriptor for EmptyDescriptor {
        fn get_int8(&self, _t: &[u8], _f: usize) -> (i64, bool) {
            (0, true)
        }
        fn get_int16(&self, _t: &[u8], _f: usize) -> (i64, bool) {
            (0, true)
        }
        fn get_int32(&self, _t: &[u8], _f: usize) -> (i64, bool) {
            (0, true)
        }
        fn get_int64(&self, _t: &[u8], _f: usize) -> (i64, bool) {
            (0, true)
        }
        fn get_uint8(&self, _t: &[u8], _f: usize) -> (u64, bool) {
            (0, true)
        }
        fn get_uint16(&self, _t: &[u8], _f: usize) -> (u64, bool) {
            (0, true)
        }
        fn get_uint32(&self, _t: &[u8], _f: usize) -> (u64, bool) {
            (0, true)
        }
        fn get_uint64(&self, _t: &[u8], _f: usize) -> (u64, bool) {
            (0, true)
        }
        fn get_float32(&self, _t: &[u8], _f: usize) -> (f32, bool) {
            (0.0, true)
        }
        fn get_float64(&self, _t: &[u8], _f: usize) -> (f64, bool) {
            (0.0, true)
        }
        fn get_decimal(&self, _t: &[u8], _f: usize) -> (bigdecimal::BigDecimal, bool) {
            (bigdecimal::BigDecimal::from(0), true)
        }
        fn get_year(&self, _t: &[u8], _f: usize) -> (u16, bool) {
            (0, true)
        }
        fn get_date(&self, _t: &[u8], _f: usize) -> (crate::tuple::Date, bool) {
            (
                crate::tuple::Date {
                    year: 0,
                    month: 0,
                    day: 0,
                },
                true,
            )
        }
        fn get_datetime(&self, _t: &[u8], _f: usize) -> (crate::tuple::DateTime, bool) {
            (
                crate::tuple::DateTime {
                    year: 0,
                    month: 0,
                    day: 0,
                    hour: 0,
                    minute: 0,
                    second: 0,
                    micros: 0,
                },
                true,
            )
        }
        fn get_sql_time(&self, _t: &[u8], _f: usize) -> (crate::tuple::SqlTime, bool) {
            (
                crate::tuple::SqlTime {
                    negative: false,
                    hours: 0,
                    minutes: 0,
                    seconds: 0,
                    micros: 0,
                },
                true,
            )
        }
        fn get_string(&self, _t: &[u8], _f: usize) -> (String, bool) {
            (String::new(), true)
        }
        fn get_bytes(&self, _t: &[u8], _f: usize) -> (Vec<u8>, bool) {
            (Vec::new(), true)
        }
        fn get_enum(&self, _t: &[u8], _f: usize) -> (u16, bool) {
            (0, true)
        }
        fn get_set(&self, _t: &[u8], _f: usize) -> (u64, bool) {
            (0, true)
        }
        fn get_bits(&self, _t: &[u8], _f: usize) -> (u64, bool) {
            (0, true)
        }
        fn get_bytes_addr(&self, _t: &[u8], _f: usize) -> (crate::tuple::Hash, bool) {
            (crate::tuple::Hash([0; 20]), true)
        }
        fn get_string_addr(&self, _t: &[u8], _f: usize) -> (crate::tuple::Hash, bool) {
            (crate::tuple::Hash([0; 20]), true)
        }
        fn get_json(
            &self,
            _t: &[u8],
            _f: usize,
        ) -> (Option<Box<dyn crate::tuple::JsonWrapper>>, bool) {
            (None, true)
        }
    }

    struct TestSchema {
        columns: Vec<Column>,
        descriptor: EmptyDescriptor,
    }

    impl Schema for TestSchema {
        fn columns(&self) -> &[Column] {
            &self.columns
        }
        fn is_keyless(&self) -> bool {
            true
        }
        fn primary_key_indices(&self) -> &[usize] {
            &[]
        }
        fn key_descriptor(&self) -> &dyn TupleDescriptor {
            &self.descriptor
        }
        fn value_descriptor(&self) -> &dyn TupleDescriptor {
            &self.descriptor
        }
    }

    #[test]
    fn test_build_table_map_column_type_array() {
        let schema = TestSchema {
            columns: vec![
                Column::new("id", ColumnTypeId::Int { unsigned: false }, false),
                Column::new(
                    "name",
                    ColumnTypeId::Varchar { max_length: 255 },
                    true,
                ),
            ],
            descriptor: EmptyDescriptor,
        };
        let tm = build_table_map(&schema, 100, "testdb", "testtable").unwrap();
        assert_eq!(tm.column_types.len(), 2);
        assert_eq!(tm.column_types[0], crate::column_types::MYSQL_TYPE_LONG);
        assert_eq!(
            tm.column_types[1],
            crate::column_types::MYSQL_TYPE_VARCHAR
        );
        assert!(!tm.can_be_null.is_set(0));
        assert!(tm.can_be_null.is_set(1));
    }

    #[test]
    fn test_length_encoded_int_small() {
        let mut buf = Vec::new();
        write_length_encoded_int(&mut buf, 10);
        assert_eq!(buf, vec![10]);
    }

    #[test]
    fn test_length_encoded_int_two_byte() {
        let mut buf = Vec::new();
        write_length_encoded_int(&mut buf, 300);
        assert_eq!(buf, vec![0xFC, 0x2C, 0x01]);
    }

    #[test]
    fn test_serialize_round_trips_table_id() {
        let schema = TestSchema {
            columns: vec![Column::new("id", ColumnTypeId::Int { unsigned: false }, false)],
            descriptor: EmptyDescriptor,
        };
        let tm = build_table_map(&schema, 0x0102030405, "db", "t").unwrap();
        let bytes = tm.serialize();
        let low = (bytes[0] as u64) | (bytes[1] as u64) << 8 | (bytes[2] as u64) << 16;
        let high = (bytes[3] as u64) | (bytes[4] as u64) << 8 | (bytes[5] as u64) << 16;
        assert_eq!(low | (high << 24), 0x0102030405);
    }
}
