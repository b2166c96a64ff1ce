//! MySQL's NEWDECIMAL on-disk/on-wire format: 9 decimal digits packed into
//! 4 big-endian bytes per full group, with a shorter encoding for the
//! partial group at the head of the integer part and the tail of the
//! fractional part. The write-side mirror of a NEWDECIMAL reader: the
//! encoder below and its tests invert that algorithm digit group by digit
//! group.
use bigdecimal::{BigDecimal, Signed};

use crate::errors::SerializeError;
use crate::packet_helpers::write_known_length_be;

const DIGITS_PER_GROUP: u32 = 9;

/// How many bytes a partial group of `n` leftover digits packs into.
fn bytes_for_leftover_digits(n: u32) -> usize {
    match n {
        0 => 0,
        1 | 2 => 1,
        3 | 4 => 2,
        5 | 6 => 3,
        7 | 8 => 4,
        _ => unreachable!("a leftover digit group never has more than 8 digits"),
    }
}

/// Encodes `value` for a `DECIMAL(precision, scale)` column.
///
/// `value` must already carry no more than `scale` fractional digits; the
/// encoder never rounds. Integer digits beyond `precision - scale` are a
/// fatal `DecimalEncoding` error.
pub fn encode_decimal(
    value: &BigDecimal,
    precision: u8,
    scale: u8,
) -> Result<Vec<u8>, SerializeError> {
    if scale > precision {
        return Err(SerializeError::DecimalEncoding(format!(
            "scale {} exceeds precision {}",
            scale, precision
        )));
    }
    let integral_digits = (precision - scale) as u32;

    let is_negative = value.is_negative();
    let scaled = value.abs().with_scale(scale as i64);

    // `with_scale` rounds to fit; if the caller handed us a value with more
    // fractional digits than the column's declared scale, that rounding
    // would silently lose data, so we reject it up front instead.
    let (_, original_exponent) = value.as_bigint_and_exponent();
    if original_exponent > scale as i64 {
        return Err(SerializeError::DecimalEncoding(format!(
            "value has more than {} fractional digits",
            scale
        )));
    }

    let rendered = scaled.to_string();
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (rendered, String::new()),
    };
    let frac_part = format!("{:0<width$}", frac_part, width = scale as usize);
    if int_part.len() as u32 > integral_digits {
        return Err(SerializeError::DecimalEncoding(format!(
            "value has more than {} integer digits",
            integral_digits
        )));
    }
    let int_part = format!("{:0>width$}", int_part, width = integral_digits as usize);

    let full_int_groups = integral_digits / DIGITS_PER_GROUP;
    let leftover_int = integral_digits % DIGITS_PER_GROUP;
    let full_frac_groups = scale as u32 / DIGITS_PER_GROUP;
    let leftover_frac = scale as u32 % DIGITS_PER_GROUP;

    let mut buf = Vec::with_capacity(
        ((full_int_groups + full_frac_groups) * 4) as usize
            + bytes_for_leftover_digits(leftover_int)
            + bytes_for_leftover_digits(leftover_frac),
    );

    let mut int_cursor = 0usize;
    if leftover_int != 0 {
        let digits = &int_part[int_cursor..int_cursor + leftover_int as usize];
        int_cursor += leftover_int as usize;
        let val: u64 = digits.parse().unwrap_or(0);
        write_known_length_be(&mut buf, val, bytes_for_leftover_digits(leftover_int));
    }
    for _ in 0..full_int_groups {
        let digits = &int_part[int_cursor..int_cursor + DIGITS_PER_GROUP as usize];
        int_cursor += DIGITS_PER_GROUP as usize;
        let val: u32 = digits.parse().unwrap_or(0);
        buf.extend_from_slice(&val.to_be_bytes());
    }

    let mut frac_cursor = 0usize;
    for _ in 0..full_frac_groups {
        let digits = &frac_part[frac_cursor..frac_cursor + DIGITS_PER_GROUP as usize];
        frac_cursor += DIGITS_PER_GROUP as usize;
        let val: u32 = digits.parse().unwrap_or(0);
        buf.extend_from_slice(&val.to_be_bytes());
    }
    if leftover_frac != 0 {
        let digits = &frac_part[frac_cursor..frac_cursor + leftover_frac as usize];
        let val: u64 = digits.parse().unwrap_or(0);
        write_known_length_be(&mut buf, val, bytes_for_leftover_digits(leftover_frac));
    }

    if !buf.is_empty() {
        buf[0] ^= 0x80;
    }
    if is_negative {
        for b in buf.iter_mut() {
            *b ^= 0xFF;
        }
    }
    Ok(buf)
}
