//! Tagged dynamic value carried by request/response payloads.
//!
//! Requests and responses carry open-ended maps whose shape depends on the
//! path being handled. Rather than inferring types from call sites, the
//! codec and handlers agree on one dynamic representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dynamically typed value used in request/response payloads and in the
/// wire-level `vars` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    I64(i64),
    /// Raw bytes (base64-encoded on the JSON-facing HTTP façade).
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// String-keyed map of values, order-stable for deterministic encoding.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Borrow as `&str`, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Copy out an `i64`, if this is an `I64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    /// Copy out a `bool`, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as `&[u8]`, if this is `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Borrow as `&[Value]`, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    /// Borrow as `&BTreeMap<String, Value>`, if this is a `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret this value the way `vars` booleans are interpreted by
    /// handlers: case-insensitive match against the codebase's yes/no
    /// vocabulary, falling back to `default` for anything else.
    pub fn as_yes_no(&self, default: bool) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::String(s) => match s.to_ascii_lowercase().trim() {
                "y" | "yes" | "true" | "1" => true,
                "n" | "no" | "false" | "0" => false,
                _ => default,
            },
            _ => default,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn yes_no_vocabulary() {
        assert!(Value::from("y").as_yes_no(false));
        assert!(Value::from("YES").as_yes_no(false));
        assert!(!Value::from("n").as_yes_no(true));
        assert!(!Value::from("no").as_yes_no(true));
        assert!(Value::Null.as_yes_no(true));
    }

    #[test]
    fn serde_roundtrip_map() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), Value::I64(1));
        m.insert("b".to_string(), Value::String("x".into()));
        let v = Value::Map(m);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
