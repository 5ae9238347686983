//! Request routing (§4.D `onReceive` steps 3-4).
//!
//! [`dispatch`] matches a request's root path segment to its handler, runs
//! it, and converts any [`BbsError`] into the matching [`WireResponse`],
//! logging each request's id, method, path, status, and duration.

use crate::handlers;
use bbs_core::Value;
use bbs_error::{BbsError, ErrorCode};
use bbs_store::Store;
use bbs_wire::{Method, WireRequest, WireResponse};
use std::time::Instant;
use uuid::Uuid;

/// Route `req` to its handler and return a response, never an error: every
/// handler failure is caught and converted to a status-coded blank (or, for
/// [`ErrorCode::Validation`], a short message) response, per §7's
/// propagation rule.
pub fn dispatch(store: &Store, caller: &str, req: &WireRequest) -> WireResponse {
    let request_id = Uuid::new_v4();
    let root_segment = req.path.split('/').next().unwrap_or("");
    let span = tracing::info_span!(
        "request",
        %request_id,
        path = %req.path,
        method = ?req.method,
        %caller,
    );
    let _enter = span.enter();
    let start = Instant::now();

    let outcome = route(store, root_segment, caller, req);
    let response = match outcome {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(error = %err, "handler error");
            error_to_response(&err)
        }
    };

    tracing::info!(
        status = response.status,
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

fn route(store: &Store, root_segment: &str, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    match root_segment {
        "" => handlers::root::handle(store, caller, req),
        "user" => handlers::user::handle(store, caller, req),
        "bulletin" => handlers::bulletin::handle(store, caller, req),
        "message" => handlers::message::handle(store, caller, req),
        "object" => handlers::object::handle(store, caller, req),
        "job" => handlers::job::handle(store, caller, req),
        other => Err(BbsError::new(
            ErrorCode::UnknownPath,
            format!("no handler registered for path {other:?}"),
        )),
    }
}

/// Reject methods a handler doesn't support, mapping to the dispatcher's
/// `UnknownMethod` (404) per §7.
pub(crate) fn require_method(req: &WireRequest, allowed: &[Method], path_kind: &str) -> Result<(), BbsError> {
    if allowed.contains(&req.method) {
        Ok(())
    } else {
        Err(BbsError::new(
            ErrorCode::UnknownMethod,
            format!("{path_kind} does not support {:?}", req.method),
        ))
    }
}

fn error_to_response(err: &BbsError) -> WireResponse {
    let status = match err.status() {
        0 => 500,
        s => s,
    };
    let payload = if err.code == ErrorCode::Validation {
        Value::String(err.message.clone())
    } else {
        Value::Null
    };
    WireResponse::new(status, payload).unwrap_or_else(|_| {
        WireResponse::new(500, Value::Null).expect("500 is always in range")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_store::FileBackend;
    use std::collections::BTreeMap;

    fn opened_store(dir: &std::path::Path) -> Store {
        let store = Store::new(FileBackend::new(dir.join("store.json")));
        store.open().unwrap();
        store
    }

    #[test]
    fn unknown_path_maps_to_404() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let req = WireRequest {
            path: "nonsense".to_string(),
            method: Method::Get,
            vars: BTreeMap::new(),
            payload: Value::Null,
        };
        let resp = dispatch(&store, "W1AW", &req);
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn root_path_returns_200() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let req = WireRequest {
            path: String::new(),
            method: Method::Get,
            vars: BTreeMap::new(),
            payload: Value::Null,
        };
        let resp = dispatch(&store, "W1AW", &req);
        assert_eq!(resp.status, 200);
    }
}
