//! Orchestrator admin routes (§6 "the orchestrator admin API: start/stop,
//! list runners, remove by id"). The orchestrator lives in the daemon
//! process, not the store, so these handlers go through an [`OrchestratorHandle`]
//! trait object rather than [`bbs_dispatcher::dispatch`].

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use bbs_error::BbsError;
use bbs_runner::{ContainerEngine, Orchestrator};
use std::sync::Arc;

/// What the admin routes need from a running orchestrator, independent of
/// its container engine type.
pub trait OrchestratorHandle: Send + Sync {
    /// Number of runners currently in flight.
    fn active_runner_count(&self) -> usize;
    /// Whether the orchestrator has a free slot for another runner.
    fn runners_available(&self) -> bool;
    /// Stop accepting new runners and signal every tracked container to
    /// shut down.
    fn stop(&self);
    /// Force a sweep of orphaned containers right now, instead of waiting
    /// for the manager thread's periodic scan.
    fn scan_orphans(&self) -> Result<(), BbsError>;
}

impl<E: ContainerEngine + 'static> OrchestratorHandle for Orchestrator<E> {
    fn active_runner_count(&self) -> usize {
        Orchestrator::active_runner_count(self)
    }
    fn runners_available(&self) -> bool {
        Orchestrator::runners_available(self)
    }
    fn stop(&self) {
        Orchestrator::stop(self)
    }
    fn scan_orphans(&self) -> Result<(), BbsError> {
        Orchestrator::scan_orphans(self)
    }
}

pub async fn status(State(orchestrator): State<Arc<dyn OrchestratorHandle>>) -> Response {
    Json(serde_json::json!({
        "active_runners": orchestrator.active_runner_count(),
        "runners_available": orchestrator.runners_available(),
    }))
    .into_response()
}

pub async fn stop(State(orchestrator): State<Arc<dyn OrchestratorHandle>>) -> Response {
    orchestrator.stop();
    Json(serde_json::json!({ "stopped": true })).into_response()
}

pub async fn scan_orphans(State(orchestrator): State<Arc<dyn OrchestratorHandle>>) -> Response {
    match orchestrator.scan_orphans() {
        Ok(()) => Json(serde_json::json!({ "scanned": true })).into_response(),
        Err(err) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::Router;
    use bbs_runner::{ExecOutput, PolicyOptions};
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    struct FakeEngine;
    impl ContainerEngine for FakeEngine {
        fn create(&self, _name: &str, _image: &str, _env: &BTreeMap<String, String>) -> Result<(), BbsError> {
            Ok(())
        }
        fn start(&self, _name: &str) -> Result<(), BbsError> {
            Ok(())
        }
        fn stop(&self, _name: &str) -> Result<(), BbsError> {
            Ok(())
        }
        fn remove(&self, _name: &str) -> Result<(), BbsError> {
            Ok(())
        }
        fn exec(
            &self,
            _name: &str,
            _argv: &[String],
            _user: &str,
            _workdir: &str,
            _env: &BTreeMap<String, String>,
        ) -> Result<ExecOutput, BbsError> {
            Ok(ExecOutput::default())
        }
        fn put_archive(&self, _name: &str, _dest: &str, _tar_bytes: &[u8]) -> Result<(), BbsError> {
            Ok(())
        }
        fn get_archive(&self, _name: &str, _path: &str) -> Result<Vec<u8>, BbsError> {
            Ok(Vec::new())
        }
        fn list(&self, _prefix: &str) -> Result<Vec<String>, BbsError> {
            Ok(Vec::new())
        }
    }

    fn policy() -> PolicyOptions {
        PolicyOptions {
            default_timeout_secs: 60,
            max_timeout_secs: 600,
            image_name: "debian".to_string(),
            max_active_jobs: 4,
            container_keepalive_secs: 300,
            name_prefix: "bbs_".to_string(),
        }
    }

    fn router() -> Router {
        let orchestrator: Arc<dyn OrchestratorHandle> = Arc::new(Orchestrator::new(FakeEngine, policy()));
        Router::new()
            .route("/admin/orchestrator", get(status))
            .route("/admin/orchestrator/stop", post(stop))
            .with_state(orchestrator)
    }

    #[tokio::test]
    async fn status_reports_zero_active_runners_when_idle() {
        let app = router();
        let resp = app
            .oneshot(axum::http::Request::builder().uri("/admin/orchestrator").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["active_runners"], 0);
        assert_eq!(json["runners_available"], true);
    }

    #[tokio::test]
    async fn stop_reports_success() {
        let app = router();
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/admin/orchestrator/stop")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }
}
