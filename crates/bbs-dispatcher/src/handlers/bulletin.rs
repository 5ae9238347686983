//! Bulletin handler: `GET`/`POST`/`DELETE` on `/bulletin` (§4.D).

use crate::util;
use bbs_core::{Bulletin, Value};
use bbs_error::{BbsError, ErrorCode};
use bbs_store::Store;
use bbs_wire::{Method, WireRequest, WireResponse};
use chrono::Utc;

pub fn handle(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    match req.method {
        Method::Get => handle_get(store, req),
        Method::Post => handle_post(store, caller, req),
        Method::Delete => handle_delete(store, caller, req),
        Method::Update => Err(BbsError::new(ErrorCode::UnknownMethod, "bulletin does not support UPDATE")),
    }
}

fn requested_id(req: &WireRequest) -> Option<u64> {
    util::path_tail(&req.path)
        .and_then(|s| s.parse().ok())
        .or_else(|| util::var_i64(&req.vars, "id").map(|n| n.max(0) as u64))
}

fn handle_get(store: &Store, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let snapshot = store.snapshot();
    if let Some(id) = requested_id(req) {
        let bulletin = snapshot
            .bulletins
            .get(&id)
            .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such bulletin").with_context("id", id))?;
        return WireResponse::new(200, bulletin_value(bulletin));
    }

    let limit = util::var_i64(&req.vars, "limit").map(|n| n.max(0) as usize);
    let mut bulletins: Vec<_> = snapshot.bulletins.values().collect();
    bulletins.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    if let Some(limit) = limit {
        bulletins.truncate(limit);
    }
    WireResponse::new(200, Value::List(bulletins.into_iter().map(bulletin_value).collect()))
}

fn handle_post(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let payload = req
        .payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "bulletin payload must be a map"))?;
    let subject = payload
        .get("subject")
        .and_then(Value::as_str)
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "bulletin requires a subject"))?
        .to_string();
    let body = payload
        .get("body")
        .and_then(Value::as_str)
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "bulletin requires a body"))?
        .to_string();

    let id = store.transaction(|root| {
        let id = root.allocate_bulletin_id();
        let bulletin = Bulletin::new(id, caller, subject.clone(), body.clone(), Utc::now());
        root.bulletins.insert(id, bulletin);
        Ok(id)
    })?;

    WireResponse::new(201, util::map([("id", Value::I64(id as i64))]))
}

fn handle_delete(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let id = requested_id(req).ok_or_else(|| BbsError::new(ErrorCode::Validation, "missing bulletin id"))?;
    store.transaction(|root| {
        let bulletin = root
            .bulletins
            .get(&id)
            .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such bulletin"))?;
        if bulletin.author != caller {
            return Err(BbsError::new(ErrorCode::Forbidden, "not the bulletin's author"));
        }
        root.bulletins.remove(&id);
        Ok(())
    })?;
    WireResponse::new(204, Value::Null)
}

fn bulletin_value(b: &Bulletin) -> Value {
    util::map([
        ("id", Value::I64(b.id as i64)),
        ("author", b.author.as_str().into()),
        ("subject", b.subject.as_str().into()),
        ("body", b.body.as_str().into()),
        ("created_at", util::dt(b.created_at)),
        ("updated_at", util::dt(b.updated_at)),
    ])
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

    fn req(path: &str, method: Method, payload: Value) -> WireRequest {
        WireRequest {
            path: path.to_string(),
            method,
            vars: BTreeMap::new(),
            payload,
        }
    }

    #[test]
    fn post_then_get_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let payload = util::map([("subject", "Hello".into()), ("body", "World".into())]);
        let post = handle(&store, "W1AW", &req("bulletin", Method::Post, payload)).unwrap();
        assert_eq!(post.status, 201);
        let id = post.payload.as_map().unwrap()["id"].as_i64().unwrap();

        let get = handle(&store, "K9ABC", &req(&format!("bulletin/{id}"), Method::Get, Value::Null)).unwrap();
        let map = get.payload.as_map().unwrap();
        assert_eq!(map["subject"].as_str(), Some("Hello"));
        assert_eq!(map["author"].as_str(), Some("W1AW"));
    }

    #[test]
    fn list_is_sorted_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        for i in 0..3 {
            let payload = util::map([("subject", format!("s{i}").as_str().into()), ("body", "b".into())]);
            handle(&store, "W1AW", &req("bulletin", Method::Post, payload)).unwrap();
        }
        let list = handle(&store, "W1AW", &req("bulletin", Method::Get, Value::Null)).unwrap();
        let items = list.payload.as_list().unwrap();
        assert_eq!(items[0].as_map().unwrap()["subject"].as_str(), Some("s2"));
    }

    #[test]
    fn delete_by_non_author_is_forbidden() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let payload = util::map([("subject", "s".into()), ("body", "b".into())]);
        let post = handle(&store, "W1AW", &req("bulletin", Method::Post, payload)).unwrap();
        let id = post.payload.as_map().unwrap()["id"].as_i64().unwrap();
        let err = handle(&store, "K9ABC", &req(&format!("bulletin/{id}"), Method::Delete, Value::Null)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[test]
    fn delete_by_author_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let payload = util::map([("subject", "s".into()), ("body", "b".into())]);
        let post = handle(&store, "W1AW", &req("bulletin", Method::Post, payload)).unwrap();
        let id = post.payload.as_map().unwrap()["id"].as_i64().unwrap();
        let resp = handle(&store, "W1AW", &req(&format!("bulletin/{id}"), Method::Delete, Value::Null)).unwrap();
        assert_eq!(resp.status, 204);
        assert!(store.snapshot().bulletins.is_empty());
    }
}
