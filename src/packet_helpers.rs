//! Primitive byte-writer utilities: little/big-endian integer emission and
//! variable-length size prefixes. The write-side mirror of the read-side
//! helpers used to decode the same wire formats.
use byteorder::{LittleEndian, WriteBytesExt};

/// Appends the low 3 bytes of `val`, little-endian. Used for MEDIUMINT/INT24
/// and for MySQL's packed `DATE` field.
pub(crate) fn write_uint24_le(buf: &mut Vec<u8>, val: u32) {
    let b = val.to_le_bytes();
    buf.extend_from_slice(&b[0..3]);
}

/// Appends the low 3 bytes of `val`, big-endian.
pub(crate) fn write_uint24_be(buf: &mut Vec<u8>, val: u32) {
    let b = val.to_be_bytes();
    buf.extend_from_slice(&b[1..4]);
}

/// Appends `val` as `n` big-endian bytes, truncating any higher bytes.
/// `n` must be between 1 and 8.
pub(crate) fn write_known_length_be(buf: &mut Vec<u8>, val: u64, n: usize) {
    let b = val.to_be_bytes();
    debug_assert!(n <= 8);
    buf.extend_from_slice(&b[8 - n..]);
}

/// A 1-byte length prefix followed by `bytes`, used for max lengths <= 255.
pub(crate) fn write_one_byte_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    debug_assert!(bytes.len() <= u8::MAX as usize);
    buf.write_u8(bytes.len() as u8).expect("writes to Vec never fail");
    buf.extend_from_slice(bytes);
}

/// Writes `bytes.len()` as an `n`-byte little-endian length prefix (`n` in
/// {1,2,3,4}) followed by `bytes`. Used for BLOB/TEXT/JSON/GEOMETRY, whose
/// declared max length determines how many prefix bytes TABLE_MAP reports.
pub(crate) fn write_var_byte_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8], n: u8) {
    let len = bytes.len() as u64;
    match n {
        1 => {
            debug_assert!(len <= u8::MAX as u64);
            buf.write_u8(len as u8).expect("writes to Vec never fail");
        }
        2 => {
            debug_assert!(len <= u16::MAX as u64);
            buf.write_u16::<LittleEndian>(len as u16)
                .expect("writes to Vec never fail");
        }
        3 => {
            debug_assert!(len <= 0xFF_FFFF);
            write_uint24_le(buf, len as u32);
        }
        4 => {
            debug_assert!(len <= u32::MAX as u64);
            buf.write_u32::<LittleEndian>(len as u32)
                .expect("writes to Vec never fail");
        }
        _ => unreachable!("variable-length prefixes are always 1-4 bytes, got {}", n),
    }
    buf.extend_from_slice(bytes);
}
