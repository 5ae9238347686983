// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! bbs-http
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! A thin HTTP façade (§2 component I) in front of the very same
//! [`bbs_store::Store`] and [`bbs_dispatcher::dispatch`] the radio
//! dispatcher uses, so a browser dashboard and a packet-radio connection
//! see one consistent store. Login is HTTP Basic Auth against `http_users`,
//! a login identity distinct from the radio `User` (§3 `HttpUser`).

mod admin;
mod auth;
mod middleware;
mod value_json;

use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method as HttpMethod, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get, post};
use axum::Router;
use bbs_core::Value;
use bbs_store::Store;
use bbs_wire::{Method as WireMethod, WireRequest};
use std::sync::Arc;

pub use admin::OrchestratorHandle;
pub use auth::AuthenticatedUser;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

/// Build the façade's Axum router. The store must already be open. No
/// `/admin/orchestrator` routes are mounted; use [`build_app_with_orchestrator`]
/// when the daemon has an orchestrator to expose.
pub fn build_app(store: Arc<Store>) -> Router {
    let state = AppState { store };
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/profile", get(profile))
        .route("/api/v1/{*rest}", any(proxy))
        .route("/api/v1", any(proxy))
        .layer(axum::middleware::from_fn(middleware::request_logger))
        .with_state(state)
}

/// Same as [`build_app`], plus `/admin/orchestrator` (status) and
/// `/admin/orchestrator/stop` (stop), backed by `orchestrator`.
pub fn build_app_with_orchestrator(store: Arc<Store>, orchestrator: Arc<dyn OrchestratorHandle>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/orchestrator", get(admin::status))
        .route("/admin/orchestrator/stop", post(admin::stop))
        .route("/admin/orchestrator/scan-orphans", post(admin::scan_orphans))
        .with_state(orchestrator);
    build_app(store).merge(admin_routes)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "operator": snapshot.config.operator,
        "motd": snapshot.config.motd,
    }))
}

async fn profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match auth::authenticate(&state.store, &headers) {
        Ok(u) => u,
        Err((status, hdr, body)) => return (status, hdr, body).into_response(),
    };
    let snapshot = state.store.snapshot();
    let Some(http_user) = snapshot.http_users.get(&user.username) else {
        return (StatusCode::UNAUTHORIZED, "invalid username or password").into_response();
    };
    let rf_enabled = http_user.rf_enabled(&snapshot.config.blacklist);
    Json(serde_json::json!({
        "username": http_user.username,
        "http_enabled": http_user.http_enabled,
        "rf_enabled": rf_enabled,
        "created_at": http_user.created_at.to_rfc3339(),
        "last_login": http_user.last_login.map(|t| t.to_rfc3339()),
    }))
    .into_response()
}

/// Translate an HTTP method/path/query/body into a [`WireRequest`], run it
/// through [`bbs_dispatcher::dispatch`] against the façade's own caller
/// identity, and translate the [`bbs_wire::WireResponse`] back into JSON.
async fn proxy(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    method: HttpMethod,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user = match auth::authenticate(&state.store, &headers) {
        Ok(u) => u,
        Err((status, hdr, msg)) => return (status, hdr, msg).into_response(),
    };

    let Some(wire_method) = to_wire_method(&method) else {
        return (StatusCode::METHOD_NOT_ALLOWED, "unsupported method").into_response();
    };

    let path = uri
        .path()
        .strip_prefix("/api/v1/")
        .or_else(|| uri.path().strip_prefix("/api/v1"))
        .unwrap_or("")
        .trim_start_matches('/')
        .to_string();

    let vars = uri.query().map(value_json::query_to_vars).unwrap_or_default();
    let payload = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(json) => value_json::json_to_value(&json),
            Err(_) => return (StatusCode::BAD_REQUEST, "malformed JSON body").into_response(),
        }
    };

    let req = WireRequest {
        path,
        method: wire_method,
        vars,
        payload,
    };

    let store = Arc::clone(&state.store);
    let caller = user.username;
    let response = tokio::task::spawn_blocking(move || bbs_dispatcher::dispatch(&store, &caller, &req))
        .await
        .expect("dispatch task panicked");

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(value_json::value_to_json(&response.payload))).into_response()
}

fn to_wire_method(method: &HttpMethod) -> Option<WireMethod> {
    match *method {
        HttpMethod::GET => Some(WireMethod::Get),
        HttpMethod::POST => Some(WireMethod::Post),
        HttpMethod::PATCH | HttpMethod::PUT => Some(WireMethod::Update),
        HttpMethod::DELETE => Some(WireMethod::Delete),
        _ => None,
    }
}
