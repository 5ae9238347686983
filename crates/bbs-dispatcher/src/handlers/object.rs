//! Object handler: `GET`/`POST`/`UPDATE`/`DELETE` on `/object` (§4.D).

use crate::util;
use bbs_core::object::OBJECT_NAME_MAX;
use bbs_core::{Object, Value};
use bbs_error::{BbsError, ErrorCode};
use bbs_store::Store;
use bbs_wire::{Method, WireRequest, WireResponse};
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

pub fn handle(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    match req.method {
        Method::Get => handle_get(store, caller, req),
        Method::Post => handle_post(store, caller, req),
        Method::Update => handle_update(store, caller, req),
        Method::Delete => handle_delete(store, caller, req),
    }
}

fn requested_uuid(req: &WireRequest) -> Result<Uuid, BbsError> {
    let raw = util::var_str(&req.vars, "uuid")
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "missing object uuid"))?;
    Uuid::parse_str(raw).map_err(|_| BbsError::new(ErrorCode::Validation, "uuid is not well-formed"))
}

fn extract_data(payload: &BTreeMap<String, Value>) -> Result<(Vec<u8>, bool), BbsError> {
    let binary = payload.get("binary").map(|v| v.as_yes_no(false)).unwrap_or(false);
    let data = match payload.get("data") {
        Some(Value::Bytes(b)) => b.clone(),
        Some(Value::String(s)) => s.clone().into_bytes(),
        _ => return Err(BbsError::new(ErrorCode::Validation, "object requires data")),
    };
    Ok((data, binary))
}

fn handle_post(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let payload = req
        .payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "object payload must be a map"))?;
    let name = payload.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    if name.chars().count() > OBJECT_NAME_MAX {
        return Err(BbsError::new(ErrorCode::Validation, "object name is too long"));
    }
    let (data, binary) = extract_data(payload)?;
    let private = payload.get("private").map(|v| v.as_yes_no(false)).unwrap_or(false);

    let uuid = store.transaction(|root| {
        let owner_uuid = root
            .users
            .get(caller)
            .ok_or_else(|| BbsError::new(ErrorCode::Unauthorized, "caller has no user record"))?
            .uuid;
        let obj = Object::new(name.clone(), data.clone(), binary, private, owner_uuid, Utc::now());
        let id = obj.uuid;
        root.objects.insert(id, obj);
        root.users.get_mut(caller).unwrap().object_uuids.push(id);
        Ok(id)
    })?;

    WireResponse::new(201, Value::String(uuid.to_string()))
}

fn handle_get(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let fetch = util::var_yes_no(&req.vars, "fetch", false);
    let snapshot = store.snapshot();

    if req.vars.contains_key("uuid") {
        let id = requested_uuid(req)?;
        let obj = snapshot
            .objects
            .get(&id)
            .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such object"))?;
        let caller_uuid = snapshot.users.get(caller).map(|u| u.uuid).unwrap_or_default();
        if !obj.readable_by(caller_uuid) {
            return Err(BbsError::new(ErrorCode::Forbidden, "object is private"));
        }
        return WireResponse::new(200, object_value(obj, fetch));
    }

    let caller_uuid = snapshot.users.get(caller).map(|u| u.uuid);
    let Some(caller_uuid) = caller_uuid else {
        return WireResponse::new(200, Value::List(Vec::new()));
    };
    let mut objects: Vec<_> = snapshot
        .objects
        .values()
        .filter(|o| o.readable_by(caller_uuid))
        .collect();

    let sort = util::var_str(&req.vars, "sort").unwrap_or("date");
    match sort {
        "name" => objects.sort_by(|a, b| a.name.cmp(&b.name)),
        "size" => objects.sort_by_key(|o| o.data.len()),
        _ => objects.sort_by(|a, b| a.modified_at.cmp(&b.modified_at)),
    }
    if util::var_yes_no(&req.vars, "reverse", false) {
        objects.reverse();
    }
    if let Some(search) = util::var_str(&req.vars, "search") {
        let needle = search.to_ascii_lowercase();
        objects.retain(|o| o.name.to_ascii_lowercase().contains(&needle));
    }
    if let Some(limit) = util::var_i64(&req.vars, "limit") {
        objects.truncate(limit.max(0) as usize);
    }

    WireResponse::new(200, Value::List(objects.into_iter().map(|o| object_value(o, fetch)).collect()))
}

fn handle_update(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let id = requested_uuid(req)?;
    let payload = req
        .payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "object patch payload must be a map"))?;
    let new_name = payload.get("name").and_then(Value::as_str).map(str::to_string);
    let new_data = match payload.get("data") {
        Some(Value::Bytes(b)) => Some((b.clone(), true)),
        Some(Value::String(s)) => Some((s.clone().into_bytes(), false)),
        _ => None,
    };

    let result_value = store.transaction(|root| {
        let caller_uuid = root
            .users
            .get(caller)
            .ok_or_else(|| BbsError::new(ErrorCode::Unauthorized, "caller has no user record"))?
            .uuid;
        let obj = root
            .objects
            .get_mut(&id)
            .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such object"))?;
        if obj.owner != caller_uuid {
            return Err(BbsError::new(ErrorCode::Forbidden, "not the object's owner"));
        }
        if let Some(name) = new_name {
            if name.chars().count() > OBJECT_NAME_MAX {
                return Err(BbsError::new(ErrorCode::Validation, "object name is too long"));
            }
            obj.name = name;
        }
        if let Some((data, binary)) = new_data {
            obj.set_data(data, binary, Utc::now());
        }
        Ok(object_value(obj, false))
    })?;

    WireResponse::new(200, result_value)
}

fn handle_delete(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let id = requested_uuid(req)?;
    store.transaction(|root| {
        let caller_uuid = root
            .users
            .get(caller)
            .ok_or_else(|| BbsError::new(ErrorCode::Unauthorized, "caller has no user record"))?
            .uuid;
        let obj = root
            .objects
            .get(&id)
            .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such object"))?;
        if obj.owner != caller_uuid {
            return Err(BbsError::new(ErrorCode::Forbidden, "not the object's owner"));
        }
        root.objects.remove(&id);
        if let Some(user) = root.users.get_mut(caller) {
            user.object_uuids.retain(|u| *u != id);
        }
        Ok(())
    })?;
    WireResponse::new(200, Value::Null)
}

fn object_value(o: &Object, fetch: bool) -> Value {
    let mut pairs = vec![
        ("uuid", Value::String(o.uuid.to_string())),
        ("name", o.name.as_str().into()),
        ("binary", o.binary.into()),
        ("private", o.private.into()),
        ("size", Value::I64(o.data.len() as i64)),
        ("created_at", util::dt(o.created_at)),
        ("modified_at", util::dt(o.modified_at)),
    ];
    if fetch {
        pairs.push(("data", Value::Bytes(o.data.clone())));
    }
    util::map(pairs)
}
