//! Module: subspace::tuple
//! Responsibility: order-preserving encode/decode of `FieldValue` tuples.
//! Does not own: subspace prefix concatenation.
//! Boundary: consumed by `Subspace::pack`/`unpack` and directory path
//! segment construction.

use icydb_error::{ErrorOrigin, InternalError};
use icydb_primitives::{FieldValue, PrimitiveType};

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT64: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_DATA: u8 = 5;
const TAG_DATE: u8 = 6;
const TAG_UUID: u8 = 7;
const TAG_ARRAY: u8 = 8;

/// Flip the sign bit of a two's-complement i64 so unsigned byte comparison
/// of the big-endian encoding matches signed numeric ordering.
fn encode_i64_ordered(v: i64) -> [u8; 8] {
    let flipped = (v as u64) ^ (1u64 << 63);
    flipped.to_be_bytes()
}

fn decode_i64_ordered(bytes: [u8; 8]) -> i64 {
    let flipped = u64::from_be_bytes(bytes);
    (flipped ^ (1u64 << 63)) as i64
}

/// Order-preserving IEEE-754 transform: flip the sign bit for positive
/// values, invert every bit for negative values, so the big-endian bytes
/// sort the same way as the floats (NaN excluded — rejected at encode).
fn encode_f64_ordered(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let transformed = if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    };
    transformed.to_be_bytes()
}

fn decode_f64_ordered(bytes: [u8; 8]) -> f64 {
    let bits = u64::from_be_bytes(bytes);
    let original = if bits & (1u64 << 63) != 0 {
        bits & !(1u64 << 63)
    } else {
        !bits
    };
    f64::from_bits(original)
}

/// Escape `0x00` as `0x00 0xFF` and terminate with `0x00 0x00`, the FDB
/// tuple-layer trick for concatenating variable-length strings without
/// ambiguity while preserving lexicographic order.
fn push_escaped(bytes: &mut Vec<u8>, raw: &[u8]) {
    for &b in raw {
        bytes.push(b);
        if b == 0x00 {
            bytes.push(0xFF);
        }
    }
    bytes.push(0x00);
    bytes.push(0x00);
}

fn read_escaped(bytes: &[u8], offset: &mut usize) -> Result<Vec<u8>, InternalError> {
    let mut out = Vec::new();
    loop {
        let b = *bytes.get(*offset).ok_or_else(truncated)?;
        *offset += 1;
        if b != 0x00 {
            out.push(b);
            continue;
        }
        let next = *bytes.get(*offset).ok_or_else(truncated)?;
        *offset += 1;
        if next == 0x00 {
            return Ok(out);
        }
        if next == 0xFF {
            out.push(0x00);
            continue;
        }
        return Err(corrupt("invalid escape sequence in packed string"));
    }
}

fn truncated() -> InternalError {
    corrupt("truncated tuple component")
}

fn corrupt(message: impl Into<String>) -> InternalError {
    InternalError::new(
        icydb_error::ErrorClass::Corruption,
        ErrorOrigin::Directory,
        message,
    )
}

/// Encode one `FieldValue` as an order-preserving, self-delimiting segment.
pub fn encode_component(value: &FieldValue) -> Result<Vec<u8>, InternalError> {
    let mut out = Vec::new();
    match value {
        FieldValue::Null => out.push(TAG_NULL),
        FieldValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        FieldValue::Int64(v) => {
            out.push(TAG_INT64);
            out.extend_from_slice(&encode_i64_ordered(*v));
        }
        FieldValue::Double(v) => {
            if v.is_nan() {
                return Err(corrupt("cannot pack NaN into an ordered tuple component"));
            }
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&encode_f64_ordered(*v));
        }
        FieldValue::String(s) => {
            out.push(TAG_STRING);
            push_escaped(&mut out, s.as_bytes());
        }
        FieldValue::Data(d) => {
            out.push(TAG_DATA);
            push_escaped(&mut out, d);
        }
        FieldValue::Date(millis) => {
            out.push(TAG_DATE);
            out.extend_from_slice(&encode_i64_ordered(*millis));
        }
        FieldValue::Uuid(bytes) => {
            out.push(TAG_UUID);
            out.extend_from_slice(bytes);
        }
        FieldValue::Array(items) => {
            out.push(TAG_ARRAY);
            let len = u32::try_from(items.len())
                .map_err(|_| corrupt("array component too long to pack"))?;
            out.extend_from_slice(&len.to_be_bytes());
            for item in items {
                let encoded = encode_component(item)?;
                out.extend_from_slice(
                    &u32::try_from(encoded.len())
                        .map_err(|_| corrupt("array element too long to pack"))?
                        .to_be_bytes(),
                );
                out.extend_from_slice(&encoded);
            }
        }
    }
    Ok(out)
}

/// Decode one component written by [`encode_component`], advancing `offset`
/// past the bytes it consumed.
pub fn decode_component(bytes: &[u8], offset: &mut usize) -> Result<FieldValue, InternalError> {
    let tag = *bytes.get(*offset).ok_or_else(truncated)?;
    *offset += 1;
    match tag {
        TAG_NULL => Ok(FieldValue::Null),
        TAG_BOOL => {
            let b = *bytes.get(*offset).ok_or_else(truncated)?;
            *offset += 1;
            Ok(FieldValue::Bool(b != 0))
        }
        TAG_INT64 => {
            let buf = read_fixed::<8>(bytes, offset)?;
            Ok(FieldValue::Int64(decode_i64_ordered(buf)))
        }
        TAG_DOUBLE => {
            let buf = read_fixed::<8>(bytes, offset)?;
            Ok(FieldValue::Double(decode_f64_ordered(buf)))
        }
        TAG_STRING => {
            let raw = read_escaped(bytes, offset)?;
            String::from_utf8(raw)
                .map(FieldValue::String)
                .map_err(|_| corrupt("packed string was not valid utf-8"))
        }
        TAG_DATA => read_escaped(bytes, offset).map(FieldValue::Data),
        TAG_DATE => {
            let buf = read_fixed::<8>(bytes, offset)?;
            Ok(FieldValue::Date(decode_i64_ordered(buf)))
        }
        TAG_UUID => {
            let buf = read_fixed::<16>(bytes, offset)?;
            Ok(FieldValue::Uuid(buf))
        }
        TAG_ARRAY => {
            let len_buf = read_fixed::<4>(bytes, offset)?;
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let elem_len_buf = read_fixed::<4>(bytes, offset)?;
                let elem_len = u32::from_be_bytes(elem_len_buf) as usize;
                let end = offset.checked_add(elem_len).ok_or_else(truncated)?;
                if end > bytes.len() {
                    return Err(truncated());
                }
                let mut inner_offset = 0usize;
                let slice = &bytes[*offset..end];
                items.push(decode_component(slice, &mut inner_offset)?);
                *offset = end;
            }
            Ok(FieldValue::Array(items))
        }
        other => Err(corrupt(format!("unknown tuple component tag {other}"))),
    }
}

fn read_fixed<const N: usize>(bytes: &[u8], offset: &mut usize) -> Result<[u8; N], InternalError> {
    let end = offset.checked_add(N).ok_or_else(truncated)?;
    if end > bytes.len() {
        return Err(truncated());
    }
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(buf)
}

/// The primitive type a decoded component tag corresponds to, for
/// schema-directed decoding of tuples whose shape isn't self-describing
/// enough on its own (arrays of arrays, for instance).
#[must_use]
pub fn tag_type(value: &FieldValue) -> PrimitiveType {
    match value {
        FieldValue::Null | FieldValue::Bool(_) => PrimitiveType::Bool,
        FieldValue::String(_) => PrimitiveType::String,
        FieldValue::Int64(_) => PrimitiveType::Int64,
        FieldValue::Double(_) => PrimitiveType::Double,
        FieldValue::Data(_) | FieldValue::Array(_) => PrimitiveType::Data,
        FieldValue::Date(_) => PrimitiveType::Date,
        FieldValue::Uuid(_) => PrimitiveType::Uuid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: FieldValue) {
        let encoded = encode_component(&value).unwrap();
        let mut offset = 0;
        let decoded = decode_component(&encoded, &mut offset).unwrap();
        assert_eq!(offset, encoded.len());
        assert!(decoded.eq_value(&value));
    }

    #[test]
    fn round_trips_every_primitive_shape() {
        round_trip(FieldValue::Null);
        round_trip(FieldValue::Bool(true));
        round_trip(FieldValue::Int64(-42));
        round_trip(FieldValue::Double(3.5));
        round_trip(FieldValue::String("hello\u{0}world".to_string()));
        round_trip(FieldValue::Data(vec![0, 1, 2, 0, 0]));
        round_trip(FieldValue::Date(1_700_000_000_000));
        round_trip(FieldValue::Uuid([7u8; 16]));
        round_trip(FieldValue::Array(vec![
            FieldValue::Int64(1),
            FieldValue::String("x".to_string()),
        ]));
    }

    #[test]
    fn encoded_int64_preserves_numeric_order() {
        let values = [-1_000_000i64, -1, 0, 1, 1_000_000];
        let mut encoded: Vec<(i64, Vec<u8>)> = values
            .iter()
            .map(|&v| (v, encode_component(&FieldValue::Int64(v)).unwrap()))
            .collect();
        encoded.sort_by(|a, b| a.1.cmp(&b.1));
        let sorted_values: Vec<i64> = encoded.into_iter().map(|(v, _)| v).collect();
        assert_eq!(sorted_values, vec![-1_000_000, -1, 0, 1, 1_000_000]);
    }

    #[test]
    fn encoded_double_preserves_numeric_order() {
        let values = [-2.5f64, -0.1, 0.0, 0.1, 2.5];
        let mut encoded: Vec<(f64, Vec<u8>)> = values
            .iter()
            .map(|&v| (v, encode_component(&FieldValue::Double(v)).unwrap()))
            .collect();
        encoded.sort_by(|a, b| a.1.cmp(&b.1));
        let sorted_values: Vec<f64> = encoded.into_iter().map(|(v, _)| v).collect();
        assert_eq!(sorted_values, values);
    }

    #[test]
    fn encoded_string_preserves_lexicographic_order() {
        let values = ["", "a", "ab", "b"];
        let mut encoded: Vec<(&str, Vec<u8>)> = values
            .iter()
            .map(|&v| (v, encode_component(&FieldValue::String(v.to_string())).unwrap()))
            .collect();
        encoded.sort_by(|a, b| a.1.cmp(&b.1));
        let sorted_values: Vec<&str> = encoded.into_iter().map(|(v, _)| v).collect();
        assert_eq!(sorted_values, values);
    }

    #[test]
    fn rejects_nan() {
        assert!(encode_component(&FieldValue::Double(f64::NAN)).is_err());
    }
}
