// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

//! Typed client over the `bbs-wire`/`bbs-transport` protocol.
//!
//! [`BbsClient::connect`] opens a [`bbs_transport::Transport`] and performs
//! the root handshake, in the same role `sidecar-kit::client::SidecarClient::spawn`
//! plays reading its process's hello frame. [`BbsClient::request`] then
//! drives one round trip per call, in the role `run_raw` plays for a sidecar
//! run: pack a request, send it chunked to the transport's MTU, and pull
//! envelopes out of a [`bbs_wire::StreamingUnpacker`] until a response
//! arrives.

use bbs_compress::CompressionMode;
use bbs_core::Value;
use bbs_error::{BbsError, ErrorCode};
use bbs_transport::Transport;
use bbs_wire::{Envelope, Method, StreamingUnpacker, WireRequest, WireResponse};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// How long [`BbsClient::connect`] waits for the root handshake response
/// before giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long [`BbsClient::request`] waits for a response envelope.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The server's greeting, decoded from the root handshake's `GET /`
/// response — the client-side analogue of `sidecar-kit`'s `HelloData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    /// Operator-configured station identity string.
    pub operator: String,
    /// Message of the day.
    pub motd: String,
    /// Human-readable line describing the caller's own account state.
    pub user: String,
    /// Whether the station currently accepts job submissions.
    pub accepts_jobs: bool,
}

fn welcome_from_payload(payload: &Value) -> Result<Welcome, BbsError> {
    let map = payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::BadFrame, "handshake response payload is not a map"))?;
    let field = |key: &str| -> Result<&str, BbsError> {
        map.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| BbsError::new(ErrorCode::BadFrame, format!("handshake response is missing `{key}`")))
    };
    Ok(Welcome {
        operator: field("operator")?.to_string(),
        motd: field("motd")?.to_string(),
        user: field("user")?.to_string(),
        accepts_jobs: map.get("accepts_jobs").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// A connected client, generic over any [`Transport`].
///
/// One `BbsClient` owns one connection; requests after the handshake are
/// sequential, matching the one-round-trip-at-a-time shape of the protocol
/// this wraps.
pub struct BbsClient<T: Transport> {
    transport: T,
    unpacker: StreamingUnpacker,
    welcome: Welcome,
    compression: CompressionMode,
}

impl<T: Transport> BbsClient<T> {
    /// Open the connection: wait for `transport` to report `Connected`,
    /// then perform the root `GET /` handshake and keep its [`Welcome`].
    pub fn connect(mut transport: T) -> Result<Self, BbsError> {
        let mut unpacker = StreamingUnpacker::new();
        let req = WireRequest {
            path: String::new(),
            method: Method::Get,
            vars: BTreeMap::new(),
            payload: Value::Null,
        };
        let resp = send_and_await(&mut transport, &mut unpacker, &req, CompressionMode::None, HANDSHAKE_TIMEOUT)?;
        if resp.status != 200 {
            return Err(BbsError::new(
                ErrorCode::Fatal,
                format!("handshake failed with status {}", resp.status),
            ));
        }
        let welcome = welcome_from_payload(&resp.payload)?;
        Ok(Self {
            transport,
            unpacker,
            welcome,
            compression: CompressionMode::Gzip,
        })
    }

    /// The greeting captured at [`connect`](Self::connect) time.
    pub fn welcome(&self) -> &Welcome {
        &self.welcome
    }

    /// Send one request and wait for its matching response.
    ///
    /// The protocol has no request id to correlate replies, so this (like
    /// the server's own connection loop) assumes one request in flight at a
    /// time per connection.
    pub fn request(
        &mut self,
        path: impl Into<String>,
        method: Method,
        vars: BTreeMap<String, Value>,
        payload: Value,
    ) -> Result<WireResponse, BbsError> {
        let req = WireRequest { path: path.into(), method, vars, payload };
        send_and_await(&mut self.transport, &mut self.unpacker, &req, self.compression, REQUEST_TIMEOUT)
    }

    /// Convenience wrapper for a bodyless `GET`.
    pub fn get(&mut self, path: impl Into<String>) -> Result<WireResponse, BbsError> {
        self.request(path, Method::Get, BTreeMap::new(), Value::Null)
    }

    /// Convenience wrapper for a `POST` with a map payload.
    pub fn post(&mut self, path: impl Into<String>, payload: Value) -> Result<WireResponse, BbsError> {
        self.request(path, Method::Post, BTreeMap::new(), payload)
    }

    /// Submit a job for execution, per the `job` handler's `POST` contract.
    pub fn submit_job(&mut self, command: Value) -> Result<WireResponse, BbsError> {
        self.post("job", command)
    }

    /// Close the underlying transport.
    pub fn disconnect(mut self) -> Result<(), BbsError> {
        self.transport
            .disconnect()
            .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to disconnect").with_source(e))
    }
}

fn send_and_await<T: Transport>(
    transport: &mut T,
    unpacker: &mut StreamingUnpacker,
    req: &WireRequest,
    compression: CompressionMode,
    timeout: Duration,
) -> Result<WireResponse, BbsError> {
    let bytes = bbs_wire::pack(&Envelope::Request(req.clone()), compression)?;
    transport
        .send_data(&bytes)
        .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to send request").with_source(e))?;

    let deadline = Instant::now() + timeout;
    loop {
        match transport.recv() {
            Ok(Some(chunk)) => {
                for envelope in unpacker.push(&chunk)? {
                    if let Envelope::Response(resp) = envelope {
                        return Ok(resp);
                    }
                    // A stray request envelope on a client connection is
                    // dropped; this wire never multiplexes server-initiated
                    // requests back to the client.
                }
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    return Err(BbsError::new(ErrorCode::Fatal, "timed out waiting for a response"));
                }
                std::thread::sleep(IDLE_POLL_INTERVAL);
            }
            Err(err) => {
                return Err(BbsError::new(ErrorCode::Fatal, "transport error while waiting for a response").with_source(err));
            }
        }
    }
}
