//! Length-prefixed tagged-value encoding for [`bbs_core::Value`].
//!
//! Every value is encoded as a one-byte tag followed by a tag-specific
//! payload. Lengths (strings, bytes, list/map element counts) are 32-bit
//! big-endian. This is the building block both the envelope's payload (`d`)
//! and its `v` vars map are encoded with.

use bbs_core::Value;
use bbs_error::{BbsError, ErrorCode};
use std::collections::BTreeMap;

fn bad_frame(message: impl Into<String>) -> BbsError {
    BbsError::new(ErrorCode::BadFrame, message)
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I64: u8 = 2;
const TAG_BYTES: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_MAP: u8 = 6;

/// Append the encoding of `value` to `buf`.
pub fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::I64(n) => {
            buf.push(TAG_I64);
            buf.extend_from_slice(&n.to_be_bytes());
        }
        Value::Bytes(b) => {
            buf.push(TAG_BYTES);
            encode_len_prefixed(buf, b);
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            encode_len_prefixed(buf, s.as_bytes());
        }
        Value::List(items) => {
            buf.push(TAG_LIST);
            buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_value(item, buf);
            }
        }
        Value::Map(map) => {
            buf.push(TAG_MAP);
            buf.extend_from_slice(&(map.len() as u32).to_be_bytes());
            for (k, v) in map {
                encode_len_prefixed(buf, k.as_bytes());
                encode_value(v, buf);
            }
        }
    }
}

/// Encode `value` into a freshly allocated buffer.
pub fn encode_value_to_vec(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(value, &mut buf);
    buf
}

fn encode_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Decode one [`Value`] starting at `*pos` in `bytes`, advancing `*pos` past
/// it. Returns a [`bbs_error::ErrorCode::BadFrame`] error on truncation or an unknown tag.
pub fn decode_value(bytes: &[u8], pos: &mut usize) -> Result<Value, BbsError> {
    let tag = read_u8(bytes, pos)?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_BOOL => Ok(Value::Bool(read_u8(bytes, pos)? != 0)),
        TAG_I64 => {
            let raw = read_exact(bytes, pos, 8)?;
            Ok(Value::I64(i64::from_be_bytes(raw.try_into().unwrap())))
        }
        TAG_BYTES => Ok(Value::Bytes(read_len_prefixed(bytes, pos)?)),
        TAG_STRING => {
            let raw = read_len_prefixed(bytes, pos)?;
            String::from_utf8(raw)
                .map(Value::String)
                .map_err(|_| bad_frame("string field is not valid UTF-8"))
        }
        TAG_LIST => {
            let count = read_u32(bytes, pos)?;
            let mut items = Vec::with_capacity(count.min(1 << 16) as usize);
            for _ in 0..count {
                items.push(decode_value(bytes, pos)?);
            }
            Ok(Value::List(items))
        }
        TAG_MAP => {
            let count = read_u32(bytes, pos)?;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key_raw = read_len_prefixed(bytes, pos)?;
                let key = String::from_utf8(key_raw)
                    .map_err(|_| bad_frame("map key is not valid UTF-8"))?;
                let value = decode_value(bytes, pos)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        other => Err(bad_frame(format!("unknown value tag {other}"))),
    }
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8, BbsError> {
    let b = *bytes
        .get(*pos)
        .ok_or_else(|| bad_frame("truncated frame"))?;
    *pos += 1;
    Ok(b)
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32, BbsError> {
    let raw = read_exact(bytes, pos, 4)?;
    Ok(u32::from_be_bytes(raw.try_into().unwrap()))
}

fn read_exact<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], BbsError> {
    let end = pos
        .checked_add(n)
        .ok_or_else(|| bad_frame("length overflow"))?;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| bad_frame("truncated frame"))?;
    *pos = end;
    Ok(slice)
}

fn read_len_prefixed(bytes: &[u8], pos: &mut usize) -> Result<Vec<u8>, BbsError> {
    let len = read_u32(bytes, pos)? as usize;
    Ok(read_exact(bytes, pos, len)?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &Value) {
        let bytes = encode_value_to_vec(v);
        let mut pos = 0;
        let back = decode_value(&bytes, &mut pos).unwrap();
        assert_eq!(pos, bytes.len());
        assert_eq!(&back, v);
    }

    #[test]
    fn roundtrips_every_variant() {
        roundtrip(&Value::Null);
        roundtrip(&Value::Bool(true));
        roundtrip(&Value::I64(-42));
        roundtrip(&Value::Bytes(vec![1, 2, 3]));
        roundtrip(&Value::String("hello".into()));
        roundtrip(&Value::List(vec![Value::I64(1), Value::String("x".into())]));

        let mut m = BTreeMap::new();
        m.insert("a".to_string(), Value::I64(1));
        m.insert("b".to_string(), Value::Bool(false));
        roundtrip(&Value::Map(m));
    }

    #[test]
    fn truncated_buffer_is_bad_frame() {
        let bytes = encode_value_to_vec(&Value::String("hello".into()));
        let mut pos = 0;
        let err = decode_value(&bytes[..bytes.len() - 2], &mut pos).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadFrame);
    }

    #[test]
    fn unknown_tag_is_bad_frame() {
        let bytes = vec![250u8];
        let mut pos = 0;
        let err = decode_value(&bytes, &mut pos).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadFrame);
    }
}
