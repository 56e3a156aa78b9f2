//! Canonical CBOR encoding for deterministic serialization.
//!
//! Implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//!
//! Every schema in docanchor is a CBOR map with small integer keys. Field
//! numbers are never reused and decoders skip keys they do not know, so a
//! newer peer can add fields without breaking an older one.

use ciborium::value::{Integer, Value};

use crate::error::{CoreError, Result};

/// Build an integer map key.
pub fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Decode a single CBOR value, rejecting trailing bytes.
pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    let mut reader = bytes;
    let value: Value =
        ciborium::from_reader(&mut reader).map_err(|e| CoreError::Decode(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CoreError::Decode(format!("{} trailing bytes", reader.len())));
    }
    Ok(value)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner);
        }
        // Undefined.
        _ => buf.push(0xf7),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n = i128::from(i);

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Typed access to an integer-keyed CBOR map.
///
/// Unknown keys are ignored. Accessors name the field in their errors so a
/// decode failure says which field was malformed.
#[derive(Debug, Clone, Copy)]
pub struct MapReader<'a> {
    entries: &'a [(Value, Value)],
}

impl<'a> MapReader<'a> {
    /// Wrap a value that must be a map.
    pub fn new(value: &'a Value, what: &str) -> Result<Self> {
        match value {
            Value::Map(entries) => Ok(Self { entries }),
            _ => Err(CoreError::Decode(format!("{}: expected map", what))),
        }
    }

    /// Raw value under `key`, if present.
    pub fn get(&self, key: u64) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    }

    /// Required byte string.
    pub fn bytes(&self, key: u64, field: &str) -> Result<&'a [u8]> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Ok(b),
            Some(_) => Err(invalid(field, "expected bytes")),
            None => Err(missing(field)),
        }
    }

    /// Optional byte string; missing and null both read as `None`.
    pub fn opt_bytes(&self, key: u64, field: &str) -> Result<Option<&'a [u8]>> {
        match self.get(key) {
            Some(Value::Bytes(b)) => Ok(Some(b)),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(invalid(field, "expected bytes or null")),
        }
    }

    /// Byte string defaulting to empty when missing.
    pub fn bytes_or_empty(&self, key: u64, field: &str) -> Result<&'a [u8]> {
        Ok(self.opt_bytes(key, field)?.unwrap_or(&[]))
    }

    /// Text string defaulting to empty when missing.
    pub fn text_or_empty(&self, key: u64, field: &str) -> Result<&'a str> {
        match self.get(key) {
            Some(Value::Text(s)) => Ok(s),
            Some(Value::Null) | None => Ok(""),
            Some(_) => Err(invalid(field, "expected text")),
        }
    }

    /// Required unsigned integer.
    pub fn uint(&self, key: u64, field: &str) -> Result<u64> {
        match self.get(key) {
            Some(Value::Integer(i)) => {
                u64::try_from(*i).map_err(|_| invalid(field, "expected unsigned integer"))
            }
            Some(_) => Err(invalid(field, "expected integer")),
            None => Err(missing(field)),
        }
    }

    /// Signed integer defaulting to zero when missing.
    pub fn int_or_zero(&self, key: u64, field: &str) -> Result<i64> {
        match self.get(key) {
            Some(Value::Integer(i)) => {
                i64::try_from(*i).map_err(|_| invalid(field, "integer out of range"))
            }
            Some(Value::Null) | None => Ok(0),
            Some(_) => Err(invalid(field, "expected integer")),
        }
    }

    /// Array defaulting to empty when missing.
    pub fn array(&self, key: u64, field: &str) -> Result<&'a [Value]> {
        match self.get(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(&[]),
            Some(_) => Err(invalid(field, "expected array")),
        }
    }

    /// Nested map defaulting to empty when missing.
    pub fn map(&self, key: u64, field: &str) -> Result<&'a [(Value, Value)]> {
        match self.get(key) {
            Some(Value::Map(entries)) => Ok(entries),
            Some(Value::Null) | None => Ok(&[]),
            Some(_) => Err(invalid(field, "expected map")),
        }
    }
}

fn invalid(field: &str, what: &str) -> CoreError {
    CoreError::Decode(format!("{}: {}", field, what))
}

fn missing(field: &str) -> CoreError {
    CoreError::Decode(format!("{}: missing", field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_integer(&mut buf, Integer::from(-1i64));
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(8.into()), Value::Integer(80.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(5.into()), Value::Integer(50.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        assert_eq!(buf[0], 0xa3);
        assert_eq!(buf[1], 0x00); // key 0
        assert_eq!(buf[2], 0x00);
        assert_eq!(buf[3], 0x05); // key 5
        assert_eq!(buf[4], 0x18);
        assert_eq!(buf[5], 50);
        assert_eq!(buf[6], 0x08); // key 8
    }

    #[test]
    fn test_encoding_independent_of_entry_order() {
        let a = Value::Map(vec![
            (key(1), Value::Text("x".into())),
            (key(2), Value::Bytes(vec![1, 2])),
        ]);
        let b = Value::Map(vec![
            (key(2), Value::Bytes(vec![1, 2])),
            (key(1), Value::Text("x".into())),
        ]);
        assert_eq!(encode_canonical(&a), encode_canonical(&b));
    }

    #[test]
    fn test_decode_roundtrip_and_reader() {
        let value = Value::Map(vec![
            (key(1), Value::Bytes(vec![9; 4])),
            (key(2), Value::Integer((-7i64).into())),
            (key(3), Value::Text("hi".into())),
            (key(99), Value::Bool(true)),
        ]);
        let decoded = decode_value(&encode_canonical(&value)).unwrap();
        let reader = MapReader::new(&decoded, "test").unwrap();

        assert_eq!(reader.bytes(1, "a").unwrap(), &[9, 9, 9, 9]);
        assert_eq!(reader.int_or_zero(2, "b").unwrap(), -7);
        assert_eq!(reader.text_or_empty(3, "c").unwrap(), "hi");
        assert_eq!(reader.text_or_empty(4, "d").unwrap(), "");
        assert!(reader.array(5, "e").unwrap().is_empty());
        assert!(matches!(reader.bytes(3, "c"), Err(CoreError::Decode(_))));
        assert!(matches!(reader.uint(2, "b"), Err(CoreError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_value(&[0xff, 0x00]).is_err());
        assert!(decode_value(&[]).is_err());
        assert!(MapReader::new(&Value::Null, "doc").is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn map_encoding_ignores_entry_order(
                entries in prop::collection::btree_map(0u64..64, any::<i64>(), 0..12)
            ) {
                let forward: Vec<_> = entries
                    .iter()
                    .map(|(k, v)| (key(*k), Value::Integer((*v).into())))
                    .collect();
                let mut reversed = forward.clone();
                reversed.reverse();

                prop_assert_eq!(
                    encode_canonical(&Value::Map(forward)),
                    encode_canonical(&Value::Map(reversed))
                );
            }

            #[test]
            fn canonical_bytes_decode_back(
                n in any::<i64>(),
                text in ".{0,32}",
                raw in prop::collection::vec(any::<u8>(), 0..64)
            ) {
                let value = Value::Map(vec![
                    (key(1), Value::Integer(n.into())),
                    (key(2), Value::Text(text)),
                    (key(3), Value::Bytes(raw)),
                ]);
                let bytes = encode_canonical(&value);
                prop_assert_eq!(encode_canonical(&decode_value(&bytes).unwrap()), bytes);
            }
        }
    }
}
