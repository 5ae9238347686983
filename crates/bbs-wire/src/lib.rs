// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Binary wire codec for the packet-radio BBS.
//!
//! An envelope is `[t:u8][c:u8][len:u32 BE][d:bytes]`, where `t` names the
//! envelope kind (request or response), `c` is the [`bbs_compress`] mode
//! tag the body was compressed with, and `d` is that compressed body. The
//! body itself decodes as one tagged [`bbs_core::Value`] via
//! [`value_codec`] — a [`Value::Map`](bbs_core::Value::Map) carrying the
//! envelope's logical fields (`path`, `method`, `vars`, `payload` for
//! requests; `status`, `payload` for responses).

mod value_codec;

pub use value_codec::{decode_value, encode_value, encode_value_to_vec};

use bbs_compress::CompressionMode;
use bbs_core::Value;
use bbs_error::{BbsError, ErrorCode};
use std::collections::BTreeMap;

/// Minimum payload size, in bytes, before compression is attempted. Payloads
/// smaller than this are always sent with [`CompressionMode::None`].
pub const MIN_COMPRESSIBLE_SIZE: usize = bbs_core::MIN_COMPRESSIBLE_SIZE;

const ENVELOPE_REQUEST: u8 = 0;
const ENVELOPE_RESPONSE: u8 = 1;

fn bad_frame(message: impl Into<String>) -> BbsError {
    BbsError::new(ErrorCode::BadFrame, message)
}

/// Request verb, carried in the envelope's `vars` map under a reserved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read a resource.
    Get,
    /// Create a resource.
    Post,
    /// Modify an existing resource.
    Update,
    /// Remove a resource.
    Delete,
}

impl Method {
    fn tag(self) -> u8 {
        match self {
            Self::Get => 0,
            Self::Post => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }

    fn from_tag(tag: i64) -> Result<Self, BbsError> {
        match tag {
            0 => Ok(Self::Get),
            1 => Ok(Self::Post),
            2 => Ok(Self::Update),
            3 => Ok(Self::Delete),
            other => Err(bad_frame(format!("unknown method tag {other}"))),
        }
    }
}

/// A decoded request: a path, a method, a `vars` map (query-string-like
/// scalars), and an arbitrary payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// Slash-separated handler path, e.g. `"bulletin/list"`.
    pub path: String,
    /// Request verb.
    pub method: Method,
    /// Scalar request parameters.
    pub vars: BTreeMap<String, Value>,
    /// Request body.
    pub payload: Value,
}

/// A decoded response: a status code and a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    /// Response status. Always in `1..=599`; `0` and `>=600` are rejected at
    /// construction, matching the HTTP-like subset the dispatcher emits.
    pub status: u16,
    /// Response body.
    pub payload: Value,
}

impl WireResponse {
    /// Build a response, rejecting out-of-range statuses.
    pub fn new(status: u16, payload: Value) -> Result<Self, BbsError> {
        if status == 0 || status >= 600 {
            return Err(BbsError::new(
                ErrorCode::Fatal,
                format!("response status {status} is out of the 1..=599 range"),
            ));
        }
        Ok(Self { status, payload })
    }
}

/// Either side of the wire protocol, as decoded from one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A request envelope.
    Request(WireRequest),
    /// A response envelope.
    Response(WireResponse),
}

const VAR_PATH: &str = "__path";
const VAR_METHOD: &str = "__method";
const VAR_VARS: &str = "__vars";
const VAR_PAYLOAD: &str = "__payload";
const VAR_STATUS: &str = "__status";

fn request_to_value(req: &WireRequest) -> Value {
    let mut map = BTreeMap::new();
    map.insert(VAR_PATH.to_string(), Value::String(req.path.clone()));
    map.insert(VAR_METHOD.to_string(), Value::I64(req.method.tag() as i64));
    map.insert(VAR_VARS.to_string(), Value::Map(req.vars.clone()));
    map.insert(VAR_PAYLOAD.to_string(), req.payload.clone());
    Value::Map(map)
}

fn value_to_request(value: Value) -> Result<WireRequest, BbsError> {
    let Value::Map(mut map) = value else {
        return Err(bad_frame("request body is not a map"));
    };
    let path = match map.remove(VAR_PATH) {
        Some(Value::String(s)) => s,
        _ => return Err(bad_frame("request is missing a string path")),
    };
    let method = match map.remove(VAR_METHOD) {
        Some(Value::I64(tag)) => Method::from_tag(tag)?,
        _ => return Err(bad_frame("request is missing a method")),
    };
    let vars = match map.remove(VAR_VARS) {
        Some(Value::Map(m)) => m,
        _ => return Err(bad_frame("request is missing a vars map")),
    };
    let payload = map.remove(VAR_PAYLOAD).unwrap_or(Value::Null);
    Ok(WireRequest {
        path,
        method,
        vars,
        payload,
    })
}

fn response_to_value(resp: &WireResponse) -> Value {
    let mut map = BTreeMap::new();
    map.insert(VAR_STATUS.to_string(), Value::I64(resp.status as i64));
    map.insert(VAR_PAYLOAD.to_string(), resp.payload.clone());
    Value::Map(map)
}

fn value_to_response(value: Value) -> Result<WireResponse, BbsError> {
    let Value::Map(mut map) = value else {
        return Err(bad_frame("response body is not a map"));
    };
    let status = match map.remove(VAR_STATUS) {
        Some(Value::I64(n)) if (1..600).contains(&n) => n as u16,
        Some(Value::I64(n)) => {
            return Err(bad_frame(format!("response status {n} out of range")));
        }
        _ => return Err(bad_frame("response is missing a status")),
    };
    let payload = map.remove(VAR_PAYLOAD).unwrap_or(Value::Null);
    Ok(WireResponse { status, payload })
}

/// Encode one [`Envelope`], applying §4.A's compression rule with `preferred`
/// as the caller's negotiated mode.
pub fn pack(envelope: &Envelope, preferred: CompressionMode) -> Result<Vec<u8>, BbsError> {
    let (kind, body_value) = match envelope {
        Envelope::Request(req) => (ENVELOPE_REQUEST, request_to_value(req)),
        Envelope::Response(resp) => (ENVELOPE_RESPONSE, response_to_value(resp)),
    };
    let raw = encode_value_to_vec(&body_value);
    let (mode, body) = bbs_compress::compress_for_wire(&raw, preferred, MIN_COMPRESSIBLE_SIZE)
        .map_err(|e| BbsError::new(ErrorCode::Fatal, "compression failed").with_source(e))?;

    let mut out = Vec::with_capacity(body.len() + 6);
    out.push(kind);
    out.push(mode.tag());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode exactly one envelope from `bytes`, which must contain no trailing
/// data. Use [`StreamingUnpacker`] when reading from a byte stream that may
/// deliver partial frames.
pub fn unpack_one(bytes: &[u8]) -> Result<Envelope, BbsError> {
    let mut pos = 0;
    let (envelope, consumed) = try_unpack_one(bytes)?
        .ok_or_else(|| bad_frame("buffer does not contain a complete frame"))?;
    pos += consumed;
    if pos != bytes.len() {
        return Err(bad_frame("trailing bytes after envelope"));
    }
    Ok(envelope)
}

/// Attempt to decode one envelope from the front of `bytes`. Returns `Ok(None)`
/// if `bytes` does not yet hold a complete frame (the header or body is
/// truncated) — the caller should wait for more data, not treat this as
/// malformed. Returns `Err` only for a frame whose header declares a kind or
/// compression tag that cannot be decoded, per §4.A's "a malformed envelope
/// fails the stream with BadFrame".
fn try_unpack_one(bytes: &[u8]) -> Result<Option<(Envelope, usize)>, BbsError> {
    const HEADER_LEN: usize = 1 + 1 + 4;
    if bytes.len() < HEADER_LEN {
        return Ok(None);
    }
    let kind = bytes[0];
    let mode_tag = bytes[1];
    let len = u32::from_be_bytes(bytes[2..6].try_into().unwrap()) as usize;
    let total = HEADER_LEN + len;
    if bytes.len() < total {
        return Ok(None);
    }
    let mode = CompressionMode::from_tag(mode_tag)
        .map_err(|e| BbsError::new(ErrorCode::BadFrame, "unsupported compression tag").with_source(e))?;
    let compressed = &bytes[HEADER_LEN..total];
    let raw = bbs_compress::decompress(compressed, mode)
        .map_err(|e| BbsError::new(ErrorCode::BadFrame, "failed to decompress envelope body").with_source(e))?;

    let mut pos = 0;
    let body_value = decode_value(&raw, &mut pos)?;
    if pos != raw.len() {
        return Err(bad_frame("trailing bytes inside decompressed envelope body"));
    }

    let envelope = match kind {
        ENVELOPE_REQUEST => Envelope::Request(value_to_request(body_value)?),
        ENVELOPE_RESPONSE => Envelope::Response(value_to_response(body_value)?),
        other => return Err(bad_frame(format!("unknown envelope kind {other}"))),
    };
    Ok(Some((envelope, total)))
}

/// Accumulates bytes from a stream transport and yields complete envelopes as
/// they become available, retaining partial frames across calls.
///
/// A malformed envelope (bad kind, bad compression tag, or a body that fails
/// to decode) poisons the unpacker: once [`push`](Self::push) returns `Err`,
/// subsequent calls keep returning the same error, matching the requirement
/// that a bad frame fails the whole stream rather than resyncing on the next
/// byte.
#[derive(Debug, Default)]
pub struct StreamingUnpacker {
    buf: Vec<u8>,
    poisoned: bool,
}

impl StreamingUnpacker {
    /// Create an empty unpacker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly received bytes and drain every envelope that is now
    /// complete. Partial trailing bytes are retained for the next call.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Envelope>, BbsError> {
        if self.poisoned {
            return Err(bad_frame("stream already failed on a malformed envelope"));
        }
        self.buf.extend_from_slice(data);

        let mut out = Vec::new();
        loop {
            match try_unpack_one(&self.buf) {
                Ok(Some((envelope, consumed))) => {
                    self.buf.drain(..consumed);
                    out.push(envelope);
                }
                Ok(None) => break,
                Err(e) => {
                    self.poisoned = true;
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    /// Number of bytes buffered but not yet forming a complete envelope.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Whether there is no buffered partial frame.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard any buffered partial frame and clear the poisoned state.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.poisoned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> WireRequest {
        let mut vars = BTreeMap::new();
        vars.insert("id".to_string(), Value::I64(42));
        WireRequest {
            path: "bulletin/list".to_string(),
            method: Method::Get,
            vars,
            payload: Value::String("hello".repeat(10)),
        }
    }

    fn sample_response() -> WireResponse {
        WireResponse::new(200, Value::String("ok".repeat(20))).unwrap()
    }

    #[test]
    fn request_roundtrips_through_pack_unpack_for_every_mode() {
        for mode in [
            CompressionMode::None,
            CompressionMode::Bzip2,
            CompressionMode::Gzip,
            CompressionMode::Deflate,
        ] {
            let req = sample_request();
            let bytes = pack(&Envelope::Request(req.clone()), mode).unwrap();
            let decoded = unpack_one(&bytes).unwrap();
            assert_eq!(decoded, Envelope::Request(req));
        }
    }

    #[test]
    fn response_roundtrips_through_pack_unpack() {
        let resp = sample_response();
        let bytes = pack(&Envelope::Response(resp.clone()), CompressionMode::Gzip).unwrap();
        let decoded = unpack_one(&bytes).unwrap();
        assert_eq!(decoded, Envelope::Response(resp));
    }

    #[test]
    fn small_payload_is_never_compressed() {
        let req = WireRequest {
            path: "x".to_string(),
            method: Method::Get,
            vars: BTreeMap::new(),
            payload: Value::Null,
        };
        let bytes = pack(&Envelope::Request(req), CompressionMode::Gzip).unwrap();
        assert_eq!(bytes[1], CompressionMode::None.tag());
    }

    #[test]
    fn response_rejects_zero_and_overflow_status() {
        assert!(WireResponse::new(0, Value::Null).is_err());
        assert!(WireResponse::new(600, Value::Null).is_err());
        assert!(WireResponse::new(1, Value::Null).is_ok());
        assert!(WireResponse::new(599, Value::Null).is_ok());
    }

    #[test]
    fn unpack_one_rejects_trailing_bytes() {
        let bytes = pack(
            &Envelope::Response(sample_response()),
            CompressionMode::None,
        )
        .unwrap();
        let mut padded = bytes;
        padded.push(0xff);
        assert!(unpack_one(&padded).is_err());
    }

    #[test]
    fn streaming_unpacker_handles_partial_frames_byte_by_byte() {
        let req = sample_request();
        let resp = sample_response();
        let mut wire = pack(&Envelope::Request(req.clone()), CompressionMode::None).unwrap();
        wire.extend(pack(&Envelope::Response(resp.clone()), CompressionMode::Gzip).unwrap());

        let mut unpacker = StreamingUnpacker::new();
        let mut received = Vec::new();
        for byte in wire {
            received.extend(unpacker.push(&[byte]).unwrap());
        }
        assert!(unpacker.is_empty());
        assert_eq!(received, vec![Envelope::Request(req), Envelope::Response(resp)]);
    }

    #[test]
    fn streaming_unpacker_poisons_on_malformed_envelope() {
        let mut unpacker = StreamingUnpacker::new();
        let mut bad = vec![99u8, 0, 0, 0, 0, 0]; // unknown envelope kind, zero-length body
        bad.truncate(6);
        assert!(unpacker.push(&bad).is_err());
        assert!(unpacker.push(&[]).is_err());
    }

    #[test]
    fn streaming_unpacker_retains_partial_frame_across_pushes() {
        let bytes = pack(&Envelope::Response(sample_response()), CompressionMode::None).unwrap();
        let mut unpacker = StreamingUnpacker::new();
        let split = bytes.len() / 2;
        assert!(unpacker.push(&bytes[..split]).unwrap().is_empty());
        assert!(unpacker.buffered_len() > 0);
        let envelopes = unpacker.push(&bytes[split..]).unwrap();
        assert_eq!(envelopes.len(), 1);
        assert!(unpacker.is_empty());
    }
}
