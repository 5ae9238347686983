//! Bridges [`bbs_core::Value`] to and from `serde_json::Value` at the
//! HTTP façade boundary, since JSON has no raw-byte type.
//!
//! Outbound (`value_to_json`), a [`Value::Bytes`] becomes a plain base64
//! string — unambiguous, because the caller already knows which field came
//! from which `Value` variant. Inbound (`json_to_value`), a JSON string is
//! always read as UTF-8 text; a client that needs to upload binary data
//! wraps it as a single-key object `{"b64": "<base64>"}`, decoded here to
//! `Value::Bytes`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bbs_core::Value;
use serde_json::{Map, Number};
use std::collections::BTreeMap;

pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n.as_i64().map(Value::I64).unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            if let (1, Some(serde_json::Value::String(b64))) = (map.len(), map.get("b64")) {
                if let Ok(bytes) = BASE64.decode(b64) {
                    return Value::Bytes(bytes);
                }
            }
            Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_value(v)))
                    .collect(),
            )
        }
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::I64(n) => serde_json::Value::Number(Number::from(*n)),
        Value::Bytes(b) => serde_json::Value::String(BASE64.encode(b)),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), value_to_json(v));
            }
            serde_json::Value::Object(out)
        }
    }
}

/// Build a `vars` map from a query string, reusing [`json_to_value`]'s
/// string handling — query params are always scalars on the wire.
pub fn query_to_vars(query: &str) -> BTreeMap<String, Value> {
    let mut vars = BTreeMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let decoded = percent_decode(raw);
        vars.insert(percent_decode(key), Value::String(decoded));
    }
    vars
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
