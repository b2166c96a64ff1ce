//! MySQL's internal binary JSON representation ("JSONB"), as stored in a
//! `JSON` column and as it appears inside ROWS events. A tree of
//! offset-indexed containers with inlined small scalars, chosen so a reader
//! can navigate straight to any element without parsing the whole document.
//!
//! This is the write-side counterpart of a JSONB decoder: where that walks a
//! byte buffer and produces [`JsonValue`]s, this module walks a [`JsonValue`]
//! tree and produces the byte buffer.
use std::collections::BTreeMap;
use std::convert::TryInto;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::errors::SerializeError;

/// A MySQL JSON document value.
///
/// Object keys are kept in a [`BTreeMap`] rather than an insertion-ordered
/// map: MySQL's binary format always serializes object keys in
/// lexicographic order, so using a map that already iterates that way
/// means the encoder never has to sort.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Double(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(BTreeMap<String, JsonValue>),
}

const TYPE_SMALL_OBJECT: u8 = 0x00;
const TYPE_LARGE_OBJECT: u8 = 0x01;
const TYPE_SMALL_ARRAY: u8 = 0x02;
const TYPE_LARGE_ARRAY: u8 = 0x03;
const TYPE_LITERAL: u8 = 0x04;
// Int16/UInt16/Int32/UInt32/Int64/UInt64 (0x05-0x0A) are valid tags on the
// wire but this encoder never produces them: every JSON number collapses to
// `JsonValue::Double` before it reaches here, matching the source encoder
// this crate's output must stay byte-compatible with.
const TYPE_DOUBLE: u8 = 0x0B;
const TYPE_STRING: u8 = 0x0C;

const LITERAL_NULL: u8 = 0x00;
const LITERAL_TRUE: u8 = 0x01;
const LITERAL_FALSE: u8 = 0x02;

/// Largest string length the 3-byte variant of the base-128 length prefix
/// can address (2^21 - 1). Longer strings are a hard encoding error rather
/// than silently truncated or escalated to a wider prefix, since the wire
/// format caps out here.
const MAX_JSON_STRING_LEN: usize = 2_097_151;

/// Internal signal that a small container's 2-byte offsets overflowed and
/// the caller must retry with the large (4-byte) layout. Never escapes
/// this module.
struct OffsetOverflow;

/// Writes MySQL's base-128 variable-length size prefix: 7 data bits per
/// byte, high bit set on every byte but the last.
fn write_json_length(buf: &mut Vec<u8>, mut len: usize) -> Result<(), SerializeError> {
    if len > MAX_JSON_STRING_LEN {
        return Err(SerializeError::JsonStringTooLong {
            len,
            limit: MAX_JSON_STRING_LEN,
        });
    }
    loop {
        let mut byte = (len & 0x7F) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if len == 0 {
            break;
        }
    }
    Ok(())
}

/// Encodes a complete JSON document: a single type byte followed by that
/// value's body. This is what goes into a ROWS event's JSON field.
pub fn encode_doc(value: &JsonValue) -> Result<Vec<u8>, SerializeError> {
    let (type_tag, body) = encode_value(value)?;
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(type_tag);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Encodes `value`'s type tag and body. For scalars the body is the bare
/// serialized value; for containers it is the full small/large container
/// (header, entries, and data).
fn encode_value(value: &JsonValue) -> Result<(u8, Vec<u8>), SerializeError> {
    match value {
        JsonValue::Array(items) => {
            let small = try_encode_container(None, items, false);
            match small {
                Ok(bytes) => Ok((TYPE_SMALL_ARRAY, bytes)),
                Err(OffsetOverflow) => {
                    let bytes = try_encode_container(None, items, true)
                        .unwrap_or_else(|_| unreachable!("large layout never overflows"));
                    Ok((TYPE_LARGE_ARRAY, bytes))
                }
            }
        }
        JsonValue::Object(map) => {
            let keys: Vec<&String> = map.keys().collect();
            let values: Vec<&JsonValue> = map.values().collect();
            let small = try_encode_object(&keys, &values, false);
            match small {
                Ok(bytes) => Ok((TYPE_SMALL_OBJECT, bytes)),
                Err(OffsetOverflow) => {
                    let bytes = try_encode_object(&keys, &values, true)
                        .unwrap_or_else(|_| unreachable!("large layout never overflows"));
                    Ok((TYPE_LARGE_OBJECT, bytes))
                }
            }
        }
        scalar => encode_scalar_body(scalar).map(|(tag, body)| (tag, body)),
    }
}

fn encode_scalar_body(value: &JsonValue) -> Result<(u8, Vec<u8>), SerializeError> {
    let mut buf = Vec::new();
    let tag = match value {
        JsonValue::Null => {
            buf.push(LITERAL_NULL);
            TYPE_LITERAL
        }
        JsonValue::Bool(true) => {
            buf.push(LITERAL_TRUE);
            TYPE_LITERAL
        }
        JsonValue::Bool(false) => {
            buf.push(LITERAL_FALSE);
            TYPE_LITERAL
        }
        JsonValue::Double(d) => {
            buf.write_f64::<LittleEndian>(*d).expect("Vec writes never fail");
            TYPE_DOUBLE
        }
        JsonValue::String(s) => {
            write_json_length(&mut buf, s.len())?;
            buf.extend_from_slice(s.as_bytes());
            TYPE_STRING
        }
        JsonValue::Array(_) | JsonValue::Object(_) => {
            return Err(SerializeError::JsonUnsupportedValue)
        }
    };
    Ok((tag, buf))
}

/// Whether a scalar of `type_tag` fits inline in a container's value-entry
/// field instead of needing an offset into the data section. Only the
/// 1-byte literal tag is ever small enough; `Double` (8 bytes) and `String`
/// (variable) always need an offset, small or large container alike.
fn is_inlinable(type_tag: u8, _large: bool) -> bool {
    type_tag == TYPE_LITERAL
}

fn value_field_width(large: bool) -> usize {
    if large {
        4
    } else {
        2
    }
}

fn write_sized(buf: &mut Vec<u8>, val: usize, large: bool) -> Result<(), OffsetOverflow> {
    if large {
        let v: u32 = val.try_into().map_err(|_| OffsetOverflow)?;
        buf.write_u32::<LittleEndian>(v).expect("Vec writes never fail");
    } else {
        let v: u16 = val.try_into().map_err(|_| OffsetOverflow)?;
        buf.write_u16::<LittleEndian>(v).expect("Vec writes never fail");
    }
    Ok(())
}

/// Builds a small or large ARRAY container. Returns `Err(OffsetOverflow)`
/// when `large` is false and some count, size, or offset doesn't fit in 16
/// bits, so the caller can retry with `large: true`.
fn try_encode_container(
    _unused: Option<()>,
    items: &[JsonValue],
    large: bool,
) -> Result<Vec<u8>, OffsetOverflow> {
    let field_width = value_field_width(large);
    let count_field_width = field_width;
    let header_size = count_field_width * 2;
    let entries_size = items.len() * (1 + field_width);

    let mut bodies = Vec::with_capacity(items.len());
    for item in items {
        let (tag, body) = encode_value(item).map_err(|_| OffsetOverflow)?;
        bodies.push((tag, body));
    }

    let data_start = header_size + entries_size;
    let mut entries = Vec::with_capacity(entries_size);
    let mut data = Vec::new();
    for (tag, body) in &bodies {
        entries.push(*tag);
        if is_inlinable(*tag, large) {
            let mut padded = body.clone();
            padded.resize(field_width, 0);
            entries.extend_from_slice(&padded);
        } else {
            let offset = data_start + data.len();
            write_sized(&mut entries, offset, large)?;
            data.extend_from_slice(body);
        }
    }

    let total_size = data_start + data.len();
    let mut out = Vec::with_capacity(total_size);
    write_sized(&mut out, items.len(), large)?;
    write_sized(&mut out, total_size, large)?;
    out.extend_from_slice(&entries);
    out.extend_from_slice(&data);
    Ok(out)
}

/// Builds a small or large OBJECT container: same entry layout as
/// [`try_encode_container`], preceded by a key-entries section (each a
/// `(key_offset, key_length)` pair) and the concatenated key bytes.
fn try_encode_object(
    keys: &[&String],
    values: &[&JsonValue],
    large: bool,
) -> Result<Vec<u8>, OffsetOverflow> {
    let field_width = value_field_width(large);
    let count_field_width = field_width;
    let header_size = count_field_width * 2;
    let key_entry_width = field_width + 2; // offset + 2-byte key length
    let key_entries_size = keys.len() * key_entry_width;
    let value_entries_size = values.len() * (1 + field_width);

    let key_data_start = header_size + key_entries_size + value_entries_size;
    let mut key_entries = Vec::with_capacity(key_entries_size);
    let mut key_data = Vec::new();
    for key in keys {
        let offset = key_data_start + key_data.len();
        write_sized(&mut key_entries, offset, large)?;
        let len: u16 = key.len().try_into().map_err(|_| OffsetOverflow)?;
        key_entries.write_u16::<LittleEndian>(len).expect("Vec writes never fail");
        key_data.extend_from_slice(key.as_bytes());
    }

    let mut bodies = Vec::with_capacity(values.len());
    for value in values {
        let (tag, body) = encode_value(value).map_err(|_| OffsetOverflow)?;
        bodies.push((tag, body));
    }

    let value_data_start = key_data_start + key_data.len();
    let mut value_entries = Vec::with_capacity(value_entries_size);
    let mut value_data = Vec::new();
    for (tag, body) in &bodies {
        value_entries.push(*tag);
        if is_inlinable(*tag, large) {
            let mut padded = body.clone();
            padded.resize(field_width, 0);
            value_entries.extend_from_slice(&padded);
        } else {
            let offset = value_data_start + value_data.len();
            write_sized(&mut value_entries, offset, large)?;
            value_data.extend_from_slice(body);
        }
    }

    let total_size = value_data_start + value_data.len();
    let mut out = Vec::with_capacity(total_size);
    write_sized(&mut out, keys.len(), large)?;
    write_sized(&mut out, total_size, large)?;
    out.extend_from_slice(&key_entries);
    out.extend_from_slice(&value_entries);
    out.extend_from_slice(&key_data);
    out.extend_from_slice(&value_data);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_literal() {
        let bytes = encode_doc(&JsonValue::Null).unwrap();
        assert_eq!(bytes, vec![TYPE_LITERAL, LITERAL_NULL]);
    }

    #[test]
    fn test_bool_literals() {
        assert_eq!(
            encode_doc(&JsonValue::Bool(true)).unwrap(),
            vec![TYPE_LITERAL, LITERAL_TRUE]
        );
        assert_eq!(
            encode_doc(&JsonValue::Bool(false)).unwrap(),
            vec![TYPE_LITERAL, LITERAL_FALSE]
        );
    }

    #[test]
    fn test_integer_valued_number_still_encodes_as_double() {
        let bytes = encode_doc(&JsonValue::Double(42.0)).unwrap();
        assert_eq!(
            bytes,
            vec![TYPE_DOUBLE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x45, 0x40]
        );
    }

    #[test]
    fn test_double() {
        let bytes = encode_doc(&JsonValue::Double(3.5)).unwrap();
        assert_eq!(bytes[0], TYPE_DOUBLE);
        assert_eq!(f64::from_le_bytes(bytes[1..9].try_into().unwrap()), 3.5);
    }

    #[test]
    fn test_short_string_length_prefix() {
        let bytes = encode_doc(&JsonValue::String("hi".to_string())).unwrap();
        assert_eq!(bytes[0], TYPE_STRING);
        assert_eq!(bytes[1], 2);
        assert_eq!(&bytes[2..], b"hi");
    }

    #[test]
    fn test_string_length_prefix_two_byte_threshold() {
        let s = "a".repeat(200);
        let bytes = encode_doc(&JsonValue::String(s.clone())).unwrap();
        assert_eq!(bytes[1], 0xC8);
        assert_eq!(bytes[2], 0x01);
        assert_eq!(&bytes[3..], s.as_bytes());
    }

    #[test]
    fn test_string_too_long_is_error() {
        let s = "a".repeat(MAX_JSON_STRING_LEN + 1);
        let err = encode_doc(&JsonValue::String(s)).unwrap_err();
        assert_matches!(err, SerializeError::JsonStringTooLong { .. });
    }

    #[test]
    fn test_small_array_fixture() {
        // A small array mixing strings and a boolean literal, with a known
        // byte-exact encoding worth pinning down explicitly.
        let arr = JsonValue::Array(vec![
            JsonValue::String("foo".to_string()),
            JsonValue::String("bar".to_string()),
            JsonValue::Bool(true),
            JsonValue::String("baz".to_string()),
        ]);
        let bytes = encode_doc(&arr).unwrap();
        let mut expected = vec![0x02, 0x04, 0x00, 0x1C, 0x00];
        expected.extend_from_slice(&[0x0C, 0x10, 0x00]);
        expected.extend_from_slice(&[0x0C, 0x14, 0x00]);
        expected.extend_from_slice(&[0x04, 0x01, 0x00]);
        expected.extend_from_slice(&[0x0C, 0x18, 0x00]);
        expected.extend_from_slice(&[0x03]);
        expected.extend_from_slice(b"foo");
        expected.extend_from_slice(&[0x03]);
        expected.extend_from_slice(b"bar");
        expected.extend_from_slice(&[0x03]);
        expected.extend_from_slice(b"baz");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_double_in_array_uses_an_offset_not_inline() {
        let arr = JsonValue::Array(vec![JsonValue::Double(1.0), JsonValue::Double(2.0)]);
        let bytes = encode_doc(&arr).unwrap();
        assert_eq!(bytes[0], TYPE_SMALL_ARRAY);
        assert_eq!(bytes[5], TYPE_DOUBLE);
        // the stored offset is relative to the body, i.e. to `bytes[1..]`
        let first_offset = 1 + u16::from_le_bytes([bytes[6], bytes[7]]) as usize;
        assert_eq!(
            f64::from_le_bytes(bytes[first_offset..first_offset + 8].try_into().unwrap()),
            1.0
        );
    }

    #[test]
    fn test_large_array_escalation() {
        let items: Vec<JsonValue> = (0..20_000)
            .map(|_| JsonValue::String("x".repeat(10)))
            .collect();
        let arr = JsonValue::Array(items);
        let bytes = encode_doc(&arr).unwrap();
        assert_eq!(bytes[0], TYPE_LARGE_ARRAY);
    }

    #[test]
    fn test_object_keys_in_lexicographic_order() {
        let mut map = BTreeMap::new();
        map.insert("zebra".to_string(), JsonValue::Double(1.0));
        map.insert("alpha".to_string(), JsonValue::Double(2.0));
        map.insert("mid".to_string(), JsonValue::Double(3.0));
        let obj = JsonValue::Object(map);
        let bytes = encode_doc(&obj).unwrap();
        assert_eq!(bytes[0], TYPE_SMALL_OBJECT);
        let count = u16::from_le_bytes([bytes[1], bytes[2]]);
        assert_eq!(count, 3);
        let key_entries_start = 5;
        let first_key_len = u16::from_le_bytes([
            bytes[key_entries_start + 2],
            bytes[key_entries_start + 3],
        ]);
        // the stored offset is relative to the body, i.e. to `bytes[1..]`
        let first_key_offset = 1 + u16::from_le_bytes([
            bytes[key_entries_start],
            bytes[key_entries_start + 1],
        ]) as usize;
        let first_key =
            &bytes[first_key_offset..first_key_offset + first_key_len as usize];
        assert_eq!(first_key, b"alpha");
    }

    #[test]
    fn test_nested_array_in_object() {
        let mut map = BTreeMap::new();
        map.insert(
            "items".to_string(),
            JsonValue::Array(vec![JsonValue::Bool(true), JsonValue::Null]),
        );
        let obj = JsonValue::Object(map);
        let bytes = encode_doc(&obj).unwrap();
        assert_eq!(bytes[0], TYPE_SMALL_OBJECT);
    }
}
