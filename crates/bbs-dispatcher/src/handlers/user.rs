//! User handler: `GET /user[/<callsign>]`, `UPDATE /user` (§4.D).

use crate::router::require_method;
use crate::util;
use bbs_core::{base_callsign, UserPatch, UserSafeDict, Value};
use bbs_error::{BbsError, ErrorCode};
use bbs_store::Store;
use bbs_wire::{Method, WireRequest, WireResponse};

pub fn handle(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    match req.method {
        Method::Get => handle_get(store, req),
        Method::Update => handle_update(store, caller, req),
        _ => {
            require_method(req, &[Method::Get, Method::Update], "user")?;
            unreachable!()
        }
    }
}

fn handle_get(store: &Store, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let snapshot = store.snapshot();
    let requested = util::path_tail(&req.path)
        .map(str::to_string)
        .or_else(|| util::var_str(&req.vars, "username").map(str::to_string));

    if let Some(requested) = requested {
        let base = base_callsign(&requested);
        let user = snapshot.users.get(&base).ok_or_else(|| {
            BbsError::new(ErrorCode::NotFound, "no such user").with_context("callsign", base.clone())
        })?;
        return WireResponse::new(200, user_value(&user.to_safe_dict()));
    }

    let limit = util::var_i64(&req.vars, "limit").map(|n| n.max(0) as usize);
    let mut users: Vec<_> = snapshot.users.values().filter(|u| !u.hidden).collect();
    users.sort_by(|a, b| a.callsign.cmp(&b.callsign));
    if let Some(limit) = limit {
        users.truncate(limit);
    }
    let list = users.into_iter().map(|u| user_value(&u.to_safe_dict())).collect();
    WireResponse::new(200, Value::List(list))
}

fn handle_update(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let payload = req
        .payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "user patch payload must be a map"))?;

    if let Some(email) = payload.get("email").and_then(Value::as_str) {
        if !util::email_valid(email) {
            return Err(BbsError::new(ErrorCode::Validation, "email address is not valid")
                .with_context("email", email.to_string()));
        }
    }

    let patch = UserPatch {
        email: payload.get("email").and_then(Value::as_str).map(str::to_string),
        bio: payload.get("bio").and_then(Value::as_str).map(str::to_string),
        status: payload.get("status").and_then(Value::as_str).map(str::to_string),
        location: payload.get("location").and_then(Value::as_str).map(str::to_string),
        socials: payload.get("socials").and_then(Value::as_list).map(|list| {
            list.iter().filter_map(Value::as_str).map(str::to_string).collect()
        }),
    };

    let safe_dict = store.transaction(|root| {
        let user = root
            .users
            .get_mut(caller)
            .ok_or_else(|| BbsError::new(ErrorCode::Unauthorized, "caller has no user record"))?;
        if !user.enabled {
            return Err(BbsError::new(ErrorCode::Unauthorized, "user is disabled"));
        }
        user.apply_patch(patch);
        Ok(user.to_safe_dict())
    })?;

    WireResponse::new(200, user_value(&safe_dict))
}

fn user_value(u: &UserSafeDict) -> Value {
    util::map([
        ("uuid", u.uuid.to_string().as_str().into()),
        ("callsign", u.callsign.as_str().into()),
        ("enabled", u.enabled.into()),
        ("hidden", u.hidden.into()),
        ("created_at", util::dt(u.created_at)),
        ("last_seen", util::dt(u.last_seen)),
        ("bio", u.bio.as_str().into()),
        ("status", u.status.as_str().into()),
        ("email", u.email.as_str().into()),
        ("location", u.location.as_str().into()),
        (
            "socials",
            Value::List(u.socials.iter().map(|s| s.as_str().into()).collect()),
        ),
    ])
}
