//! The binlog column-type table: one variant per MySQL wire type, each
//! knowing how to pack a value from a [`TupleDescriptor`] and how to render
//! its own TABLE_MAP metadata bytes.
//!
//! Variant payloads carry exactly the type parameters MySQL's TABLE_MAP
//! metadata encodes (precision/scale, declared length, fractional-second
//! precision, enum/set member count) so `metadata()` is a pure function of
//! the variant.
use byteorder::{LittleEndian, WriteBytesExt};

use crate::decimal::encode_decimal;
use crate::errors::SerializeError;
use crate::jsonb::encode_doc;
use crate::packet_helpers::{write_uint24_le, write_var_byte_length_prefixed};
use crate::temporal::{encode_date, encode_datetime2, encode_time2, encode_timestamp2, encode_year};
use crate::tuple::{Context, NodeStore, TupleDescriptor};

/// Real MySQL protocol type-id byte, per `include/mysql_com.h`'s
/// `enum_field_types`. Used only when a caller needs the raw wire tag (e.g.
/// future TABLE_MAP column-type arrays); the richer [`ColumnTypeId`] enum
/// is what this crate operates on internally.
pub const MYSQL_TYPE_DECIMAL: u8 = 0;
pub const MYSQL_TYPE_TINY: u8 = 1;
pub const MYSQL_TYPE_SHORT: u8 = 2;
pub const MYSQL_TYPE_LONG: u8 = 3;
pub const MYSQL_TYPE_FLOAT: u8 = 4;
pub const MYSQL_TYPE_DOUBLE: u8 = 5;
pub const MYSQL_TYPE_TIMESTAMP: u8 = 7;
pub const MYSQL_TYPE_LONGLONG: u8 = 8;
pub const MYSQL_TYPE_INT24: u8 = 9;
pub const MYSQL_TYPE_DATE: u8 = 10;
pub const MYSQL_TYPE_TIME: u8 = 11;
pub const MYSQL_TYPE_DATETIME: u8 = 12;
pub const MYSQL_TYPE_YEAR: u8 = 13;
pub const MYSQL_TYPE_VARCHAR: u8 = 15;
pub const MYSQL_TYPE_BIT: u8 = 16;
pub const MYSQL_TYPE_TIMESTAMP2: u8 = 17;
pub const MYSQL_TYPE_DATETIME2: u8 = 18;
pub const MYSQL_TYPE_TIME2: u8 = 19;
pub const MYSQL_TYPE_JSON: u8 = 245;
pub const MYSQL_TYPE_NEWDECIMAL: u8 = 246;
pub const MYSQL_TYPE_ENUM: u8 = 247;
pub const MYSQL_TYPE_SET: u8 = 248;
pub const MYSQL_TYPE_TINY_BLOB: u8 = 249;
pub const MYSQL_TYPE_MEDIUM_BLOB: u8 = 250;
pub const MYSQL_TYPE_LONG_BLOB: u8 = 251;
pub const MYSQL_TYPE_BLOB: u8 = 252;
pub const MYSQL_TYPE_VAR_STRING: u8 = 253;
pub const MYSQL_TYPE_STRING: u8 = 254;
pub const MYSQL_TYPE_GEOMETRY: u8 = 255;

/// A column's binlog-visible type, carrying the type parameters TABLE_MAP
/// needs to describe it (length, precision, fractional-second digits, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnTypeId {
    TinyInt { unsigned: bool },
    SmallInt { unsigned: bool },
    MediumInt { unsigned: bool },
    Int { unsigned: bool },
    BigInt { unsigned: bool },
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Year,
    Date,
    DateTime { precision: u8 },
    Timestamp { precision: u8 },
    Time { precision: u8 },
    Varchar { max_length: u32 },
    Char { length: u32 },
    Enum { member_count: u16 },
    Set { member_count: u16 },
    Blob { length_bytes: u8 },
    Json,
    Geometry,
    Bit { bits: u16 },
}

impl ColumnTypeId {
    /// The raw protocol type byte TABLE_MAP's column-type array carries.
    pub fn wire_type(&self) -> u8 {
        match self {
            ColumnTypeId::TinyInt { .. } => MYSQL_TYPE_TINY,
            ColumnTypeId::SmallInt { .. } => MYSQL_TYPE_SHORT,
            ColumnTypeId::MediumInt { .. } => MYSQL_TYPE_INT24,
            ColumnTypeId::Int { .. } => MYSQL_TYPE_LONG,
            ColumnTypeId::BigInt { .. } => MYSQL_TYPE_LONGLONG,
            ColumnTypeId::Float => MYSQL_TYPE_FLOAT,
            ColumnTypeId::Double => MYSQL_TYPE_DOUBLE,
            ColumnTypeId::Decimal { .. } => MYSQL_TYPE_NEWDECIMAL,
            ColumnTypeId::Year => MYSQL_TYPE_YEAR,
            ColumnTypeId::Date => MYSQL_TYPE_DATE,
            ColumnTypeId::DateTime { .. } => MYSQL_TYPE_DATETIME2,
            ColumnTypeId::Timestamp { .. } => MYSQL_TYPE_TIMESTAMP2,
            ColumnTypeId::Time { .. } => MYSQL_TYPE_TIME2,
            ColumnTypeId::Varchar { .. } => MYSQL_TYPE_VARCHAR,
            // Enum/Set columns report STRING as their TABLE_MAP type byte;
            // their real type (ENUM/SET) is stashed in the metadata's first
            // byte instead, the same STRING-family indirection Char uses.
            ColumnTypeId::Char { .. } | ColumnTypeId::Enum { .. } | ColumnTypeId::Set { .. } => {
                MYSQL_TYPE_STRING
            }
            ColumnTypeId::Blob { length_bytes } => match length_bytes {
                1 => MYSQL_TYPE_TINY_BLOB,
                2 => MYSQL_TYPE_BLOB,
                3 => MYSQL_TYPE_MEDIUM_BLOB,
                4 => MYSQL_TYPE_LONG_BLOB,
                _ => unreachable!("blob length-byte count is always 1-4"),
            },
            ColumnTypeId::Json => MYSQL_TYPE_JSON,
            ColumnTypeId::Geometry => MYSQL_TYPE_GEOMETRY,
            ColumnTypeId::Bit { .. } => MYSQL_TYPE_BIT,
        }
    }

    /// The TABLE_MAP metadata bytes for this column, per MySQL's
    /// `Field::save_field_metadata` family. Length is type-dependent: 0 for
    /// fixed-width integer and temporal types, up to 2 bytes otherwise.
    pub fn metadata(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            ColumnTypeId::Decimal { precision, scale } => {
                buf.push(*precision);
                buf.push(*scale);
            }
            ColumnTypeId::DateTime { precision }
            | ColumnTypeId::Timestamp { precision }
            | ColumnTypeId::Time { precision } => {
                buf.push(*precision);
            }
            ColumnTypeId::Varchar { max_length } => {
                buf.write_u16::<LittleEndian>(*max_length as u16)
                    .expect("Vec writes never fail");
            }
            ColumnTypeId::Char { length } => {
                // Field_string::do_save_field_metadata: the declared length
                // can need up to 10 bits, so the top 2 are XOR-borrowed into
                // the real-type byte. The same XOR undoes it on read since
                // XOR is its own inverse.
                let real_type = MYSQL_TYPE_STRING;
                let high_bits = ((*length & 0x300) >> 4) as u8;
                buf.push(real_type ^ high_bits);
                buf.push((*length & 0xFF) as u8);
            }
            ColumnTypeId::Enum { member_count } => {
                // (real_type, pack_length): pack_length is the byte width of
                // the stored ordinal, 1 below 256 members, 2 otherwise.
                buf.push(MYSQL_TYPE_ENUM);
                buf.push(enum_pack_length(*member_count));
            }
            ColumnTypeId::Set { member_count } => {
                // (real_type, pack_length): pack_length is the byte width of
                // the member bitmask, ceil(member_count / 8).
                buf.push(MYSQL_TYPE_SET);
                buf.push(set_pack_length(*member_count));
            }
            ColumnTypeId::Blob { length_bytes } => {
                buf.push(*length_bytes);
            }
            ColumnTypeId::Bit { bits } => {
                buf.push((*bits % 8) as u8);
                buf.push((*bits / 8) as u8);
            }
            ColumnTypeId::Json => {
                buf.push(4); // length-prefix width for the JSON blob body
            }
            ColumnTypeId::Geometry => {
                buf.push(4); // length-prefix width for the WKB blob body
            }
            // Field_real::do_save_field_metadata writes its own pack_length
            // (4 for FLOAT, 8 for DOUBLE), unlike the fixed-width integer
            // types below, which carry no metadata at all.
            ColumnTypeId::Float => buf.push(4),
            ColumnTypeId::Double => buf.push(8),
            ColumnTypeId::TinyInt { .. }
            | ColumnTypeId::SmallInt { .. }
            | ColumnTypeId::MediumInt { .. }
            | ColumnTypeId::Int { .. }
            | ColumnTypeId::BigInt { .. }
            | ColumnTypeId::Year
            | ColumnTypeId::Date => {}
        }
        buf
    }

    /// Packs this column's value out of `tuple` at `field_index` using
    /// `descriptor`'s typed accessor, or returns `Ok(None)` when the field
    /// is SQL NULL (the caller is responsible for the row's null bitmap).
    pub fn serialize(
        &self,
        descriptor: &dyn TupleDescriptor,
        tuple: &[u8],
        field_index: usize,
        ctx: &Context,
        node_store: Option<&dyn NodeStore>,
    ) -> Result<Option<Vec<u8>>, SerializeError> {
        // Cancellation is only ever observed around out-of-band blob
        // resolution (`resolve`, below) — not at the top of every column,
        // matching the cooperative-cancellation contract in `tuple::Context`.
        macro_rules! fetch {
            ($getter:ident) => {{
                let (value, not_null) = descriptor.$getter(tuple, field_index);
                if !not_null {
                    return Ok(None);
                }
                value
            }};
        }

        let bytes = match self {
            ColumnTypeId::TinyInt { unsigned } => {
                let mut buf = Vec::with_capacity(1);
                if *unsigned {
                    buf.push(fetch!(get_uint8) as u8);
                } else {
                    buf.push(fetch!(get_int8) as i8 as u8);
                }
                buf
            }
            ColumnTypeId::SmallInt { unsigned } => {
                let mut buf = Vec::with_capacity(2);
                if *unsigned {
                    buf.write_u16::<LittleEndian>(fetch!(get_uint16) as u16)
                        .expect("Vec writes never fail");
                } else {
                    buf.write_i16::<LittleEndian>(fetch!(get_int16) as i16)
                        .expect("Vec writes never fail");
                }
                buf
            }
            ColumnTypeId::MediumInt { unsigned } => {
                let mut buf = Vec::with_capacity(3);
                if *unsigned {
                    write_uint24_le(&mut buf, fetch!(get_uint32) as u32);
                } else {
                    write_uint24_le(&mut buf, fetch!(get_int32) as u32);
                }
                buf
            }
            ColumnTypeId::Int { unsigned } => {
                let mut buf = Vec::with_capacity(4);
                if *unsigned {
                    buf.write_u32::<LittleEndian>(fetch!(get_uint32) as u32)
                        .expect("Vec writes never fail");
                } else {
                    buf.write_i32::<LittleEndian>(fetch!(get_int32) as i32)
                        .expect("Vec writes never fail");
                }
                buf
            }
            ColumnTypeId::BigInt { unsigned } => {
                let mut buf = Vec::with_capacity(8);
                if *unsigned {
                    buf.write_u64::<LittleEndian>(fetch!(get_uint64))
                        .expect("Vec writes never fail");
                } else {
                    buf.write_i64::<LittleEndian>(fetch!(get_int64))
                        .expect("Vec writes never fail");
                }
                buf
            }
            ColumnTypeId::Float => {
                let mut buf = Vec::with_capacity(4);
                buf.write_f32::<LittleEndian>(fetch!(get_float32))
                    .expect("Vec writes never fail");
                buf
            }
            ColumnTypeId::Double => {
                let mut buf = Vec::with_capacity(8);
                buf.write_f64::<LittleEndian>(fetch!(get_float64))
                    .expect("Vec writes never fail");
                buf
            }
            ColumnTypeId::Decimal { precision, scale } => {
                let value = fetch!(get_decimal);
                encode_decimal(&value, *precision, *scale)?
            }
            ColumnTypeId::Year => {
                vec![encode_year(fetch!(get_year))]
            }
            ColumnTypeId::Date => encode_date(fetch!(get_date)).to_vec(),
            ColumnTypeId::DateTime { precision } => {
                encode_datetime2(fetch!(get_datetime), *precision)
            }
            ColumnTypeId::Timestamp { precision } => {
                encode_timestamp2(fetch!(get_datetime), *precision)
            }
            ColumnTypeId::Time { precision } => encode_time2(fetch!(get_sql_time), *precision),
            ColumnTypeId::Varchar { max_length } => {
                let s = fetch!(get_string);
                let prefix_bytes = if *max_length > 255 { 2 } else { 1 };
                let mut buf = Vec::with_capacity(s.len() + prefix_bytes);
                write_var_byte_length_prefixed(&mut buf, s.as_bytes(), prefix_bytes as u8);
                buf
            }
            ColumnTypeId::Char { length } => {
                let s = fetch!(get_string);
                let prefix_bytes = if *length > 255 { 2 } else { 1 };
                let mut buf = Vec::with_capacity(s.len() + prefix_bytes);
                write_var_byte_length_prefixed(&mut buf, s.as_bytes(), prefix_bytes as u8);
                buf
            }
            ColumnTypeId::Enum { member_count } => {
                let value = fetch!(get_enum);
                let pack_length = enum_pack_length(*member_count) as usize;
                let mut buf = Vec::with_capacity(pack_length);
                let full = value.to_le_bytes();
                buf.extend_from_slice(&full[..pack_length]);
                buf
            }
            ColumnTypeId::Set { member_count } => {
                let value = fetch!(get_set);
                let pack_length = set_pack_length(*member_count) as usize;
                let mut buf = Vec::with_capacity(pack_length);
                let full = value.to_le_bytes();
                buf.extend_from_slice(&full[..pack_length]);
                buf
            }
            ColumnTypeId::Blob { length_bytes } => {
                let addr = fetch!(get_bytes_addr);
                let bytes = resolve(node_store, &addr, ctx)?;
                let mut buf = Vec::with_capacity(bytes.len() + *length_bytes as usize);
                write_var_byte_length_prefixed(&mut buf, &bytes, *length_bytes);
                buf
            }
            ColumnTypeId::Json => {
                let (wrapper, not_null) = descriptor.get_json(tuple, field_index);
                if !not_null {
                    return Ok(None);
                }
                let wrapper = wrapper.ok_or(SerializeError::JsonUnsupportedValue)?;
                let value = wrapper.to_value(ctx)?;
                let body = encode_doc(&value)?;
                let mut buf = Vec::with_capacity(body.len() + 4);
                write_var_byte_length_prefixed(&mut buf, &body, 4);
                buf
            }
            ColumnTypeId::Geometry => {
                // WKB payload, resolved out-of-band the same way a BLOB's
                // bytes are; only the length-prefix width (always 4) differs.
                let addr = fetch!(get_bytes_addr);
                let bytes = resolve(node_store, &addr, ctx)?;
                let mut buf = Vec::with_capacity(bytes.len() + 4);
                write_var_byte_length_prefixed(&mut buf, &bytes, 4);
                buf
            }
            ColumnTypeId::Bit { bits } => {
                let value = fetch!(get_bits);
                let byte_count = ((*bits as usize) + 7) / 8;
                let mut buf = Vec::with_capacity(byte_count);
                let full = value.to_be_bytes();
                buf.extend_from_slice(&full[8 - byte_count..]);
                buf
            }
        };
        Ok(Some(bytes))
    }
}

/// Byte width of an ENUM column's stored ordinal: 1 byte below 256 members,
/// 2 bytes otherwise (MySQL never declares an ENUM with more than 65535
/// members).
fn enum_pack_length(member_count: u16) -> u8 {
    if member_count <= 255 {
        1
    } else {
        2
    }
}

/// Byte width of a SET column's stored member bitmask: one bit per member,
/// rounded up to a whole byte.
fn set_pack_length(member_count: u16) -> u8 {
    ((member_count as u32 + 7) / 8) as u8
}

fn resolve(
    node_store: Option<&dyn NodeStore>,
    addr: &crate::tuple::Hash,
    ctx: &Context,
) -> Result<Vec<u8>, SerializeError> {
    ctx.check_cancelled()?;
    let store = node_store.ok_or(SerializeError::NodeStoreMissing)?;
    tracing::trace!(%addr, "resolving out-of-band value");
    store
        .read_bytes(addr)
        .map_err(SerializeError::OutOfBandResolutionFailed)
}
