//! Root handler: `GET /` (§4.D).

use crate::router::require_method;
use crate::util;
use bbs_error::BbsError;
use bbs_store::Store;
use bbs_wire::{Method, WireRequest, WireResponse};

/// `GET /` → `{operator, motd, user, accepts_jobs}`.
///
/// Compression of the response is negotiated by the caller from the
/// request's `v.C` var at the codec layer, not by this handler.
pub fn handle(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    require_method(req, &[Method::Get], "root")?;
    let snapshot = store.snapshot();
    let user_line = match snapshot.users.get(caller) {
        Some(u) if u.enabled => format!("User {caller} is enabled"),
        _ => format!("User {caller} is not enabled"),
    };
    WireResponse::new(
        200,
        util::map([
            ("operator", snapshot.config.operator.as_str().into()),
            ("motd", snapshot.config.motd.as_str().into()),
            ("user", user_line.as_str().into()),
            ("accepts_jobs", snapshot.config.jobs_enabled.into()),
        ]),
    )
}
