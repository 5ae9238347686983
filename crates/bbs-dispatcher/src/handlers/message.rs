//! Message handler: `POST`/`GET` on `/message` (§4.D).
//!
//! Attachment resolution mirrors the original system's `ObjectAttachment`:
//! a reference to an object is snapshotted to a plain byte copy at send
//! time, inside the same transaction that creates the per-recipient and
//! sent-folder `Message` copies.

use crate::util;
use bbs_core::callsign::BROADCAST_RECIPIENT;
use bbs_core::{Attachment, AttachmentSource, Message, Value};
use bbs_error::{BbsError, ErrorCode};
use bbs_store::{Store, StoreRoot};
use bbs_wire::{Method, WireRequest, WireResponse};
use chrono::Utc;
use uuid::Uuid;

pub fn handle(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    match req.method {
        Method::Get => handle_get(store, caller, req),
        Method::Post => handle_post(store, caller, req),
        _ => Err(BbsError::new(ErrorCode::UnknownMethod, "message supports GET and POST")),
    }
}

fn parse_attachment_source(v: &Value) -> Result<AttachmentSource, BbsError> {
    let map = v
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "attachment must be a map"))?;
    if let Some(raw) = map.get("uuid").and_then(Value::as_str) {
        let uuid = Uuid::parse_str(raw).map_err(|_| BbsError::new(ErrorCode::Validation, "attachment uuid is not well-formed"))?;
        return Ok(AttachmentSource::ObjectRef { uuid });
    }
    let name = map.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    let binary = map.get("binary").map(|v| v.as_yes_no(false)).unwrap_or(false);
    let data = match map.get("data") {
        Some(Value::Bytes(b)) => b.clone(),
        Some(Value::String(s)) => s.clone().into_bytes(),
        _ => return Err(BbsError::new(ErrorCode::Validation, "attachment requires data")),
    };
    Ok(AttachmentSource::Inline { name, data, binary })
}

fn resolve_attachment(root: &StoreRoot, caller_uuid: Uuid, src: &AttachmentSource) -> Result<Attachment, BbsError> {
    match src {
        AttachmentSource::Inline { name, data, binary } => Ok(Attachment {
            name: name.clone(),
            binary: *binary,
            data: data.clone(),
        }),
        AttachmentSource::ObjectRef { uuid } => {
            let obj = root
                .objects
                .get(uuid)
                .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such object"))?;
            if !obj.readable_by(caller_uuid) {
                return Err(BbsError::new(ErrorCode::Forbidden, "object is private"));
            }
            Ok(Attachment {
                name: obj.name.clone(),
                binary: obj.binary,
                data: obj.data.clone(),
            })
        }
    }
}

fn handle_post(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let payload = req
        .payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "message payload must be a map"))?;
    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "message requires text"))?
        .to_string();
    let to_raw = payload
        .get("to")
        .and_then(Value::as_list)
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "message requires a to list"))?;

    let mut broadcast = false;
    let mut recipients = Vec::new();
    for v in to_raw {
        let s = v
            .as_str()
            .ok_or_else(|| BbsError::new(ErrorCode::Validation, "recipient must be a string"))?;
        let upper = s.trim().to_ascii_uppercase();
        if upper == BROADCAST_RECIPIENT {
            broadcast = true;
            break;
        }
        recipients.push(upper);
    }

    let attachment_sources: Vec<AttachmentSource> = match payload.get("attachments") {
        Some(Value::List(items)) => items.iter().map(parse_attachment_source).collect::<Result<_, _>>()?,
        _ => Vec::new(),
    };

    let (successes, failed, msg_id) = store.transaction(|root| {
        let caller_uuid = root
            .users
            .get(caller)
            .ok_or_else(|| BbsError::new(ErrorCode::Unauthorized, "caller has no user record"))?
            .uuid;
        let attachments: Vec<Attachment> = attachment_sources
            .iter()
            .map(|src| resolve_attachment(root, caller_uuid, src))
            .collect::<Result<_, _>>()?;

        let resolved_recipients: Vec<String> = if broadcast {
            root.users
                .values()
                .filter(|u| u.enabled && !u.hidden)
                .map(|u| u.callsign.clone())
                .collect()
        } else {
            recipients.clone()
        };

        let msg_id = root.allocate_message_uuid();
        let mut successes = 0i64;
        let mut failed = Vec::new();
        for recipient in &resolved_recipients {
            let deliverable = root.users.get(recipient).map(|u| u.enabled).unwrap_or(false);
            if !deliverable {
                failed.push(recipient.clone());
                continue;
            }
            let copy = Message {
                uuid: msg_id,
                sent_at: Utc::now(),
                text: text.clone(),
                recipients: if broadcast {
                    vec![BROADCAST_RECIPIENT.to_string()]
                } else {
                    vec![recipient.clone()]
                },
                sender: caller.to_string(),
                retrieved: false,
                delivered: true,
                attachments: attachments.clone(),
            };
            root.deliver_message(recipient, copy);
            successes += 1;
        }

        let sent_copy = Message {
            uuid: msg_id,
            sent_at: Utc::now(),
            text: text.clone(),
            recipients: if broadcast {
                vec![BROADCAST_RECIPIENT.to_string()]
            } else {
                resolved_recipients.clone()
            },
            sender: caller.to_string(),
            retrieved: false,
            delivered: true,
            attachments,
        };
        root.deliver_message(caller, sent_copy);

        Ok((successes, failed, msg_id))
    })?;

    WireResponse::new(
        200,
        util::map([
            ("successes", Value::I64(successes)),
            ("failed", Value::List(failed.into_iter().map(|s| s.as_str().into()).collect())),
            ("msg_id", Value::String(msg_id.to_string())),
        ]),
    )
}

fn handle_get(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let id = util::var_str(&req.vars, "id").and_then(|s| Uuid::parse_str(s).ok());
    let since = util::var_str(&req.vars, "since").and_then(util::parse_date_digits);
    let source = util::var_str(&req.vars, "source").unwrap_or("received");
    let limit = util::var_i64(&req.vars, "limit").map(|n| n.max(0) as usize);
    let fetch_text = util::var_yes_no(&req.vars, "fetch_text", true);
    let fetch_attachments = util::var_yes_no(&req.vars, "fetch_attachments", false);
    let reverse = util::var_yes_no(&req.vars, "reverse", false);
    let sort = util::var_str(&req.vars, "sort").unwrap_or("date");
    let search = util::var_str(&req.vars, "search").map(str::to_ascii_lowercase);

    let selected = store.transaction(|root| {
        let mailbox = root.messages.get(caller).cloned().unwrap_or_default();
        let mut selected: Vec<Message> = mailbox
            .into_iter()
            .filter(|m| {
                let matches_source = match source {
                    "sent" => m.sender == caller,
                    "all" => true,
                    _ => m.sender != caller,
                };
                if !matches_source {
                    return false;
                }
                if let Some(id) = id {
                    if m.uuid != id {
                        return false;
                    }
                }
                if let Some(since) = since {
                    if m.sent_at < since {
                        return false;
                    }
                }
                if let Some(ref needle) = search {
                    let haystack = format!("{} {} {}", m.text, m.sender, m.recipients.join(" ")).to_ascii_lowercase();
                    if !haystack.contains(needle.as_str()) {
                        return false;
                    }
                }
                true
            })
            .collect();

        match sort {
            "from" => selected.sort_by(|a, b| a.sender.cmp(&b.sender)),
            "to" => selected.sort_by(|a, b| a.recipients.join(",").cmp(&b.recipients.join(","))),
            _ => selected.sort_by(|a, b| a.sent_at.cmp(&b.sent_at)),
        }
        if reverse {
            selected.reverse();
        }
        if let Some(limit) = limit {
            selected.truncate(limit);
        }

        let matched_ids: std::collections::HashSet<Uuid> = selected.iter().map(|m| m.uuid).collect();
        if let Some(mailbox_mut) = root.messages.get_mut(caller) {
            for m in mailbox_mut.iter_mut() {
                if matched_ids.contains(&m.uuid) {
                    m.mark_retrieved();
                }
            }
        }

        Ok(selected)
    })?;

    if id.is_some() {
        return match selected.into_iter().next() {
            Some(m) => WireResponse::new(200, message_value(&m, fetch_text, fetch_attachments)),
            None => Err(BbsError::new(ErrorCode::NotFound, "no such message")),
        };
    }

    let values = selected
        .into_iter()
        .map(|m| message_value(&m, fetch_text, fetch_attachments))
        .collect();
    WireResponse::new(200, Value::List(values))
}

fn message_value(m: &Message, fetch_text: bool, fetch_attachments: bool) -> Value {
    let mut pairs = vec![
        ("uuid", Value::String(m.uuid.to_string())),
        ("sender", m.sender.as_str().into()),
        (
            "recipients",
            Value::List(m.recipients.iter().map(|r| r.as_str().into()).collect()),
        ),
        ("sent_at", util::dt(m.sent_at)),
        ("retrieved", m.retrieved.into()),
        ("delivered", m.delivered.into()),
    ];
    if fetch_text {
        pairs.push(("text", m.text.as_str().into()));
    }
    if fetch_attachments {
        pairs.push((
            "attachments",
            Value::List(
                m.attachments
                    .iter()
                    .map(|a| {
                        util::map([
                            ("name", a.name.as_str().into()),
                            ("binary", a.binary.into()),
                            ("size", Value::I64(a.size() as i64)),
                            ("data", Value::Bytes(a.data.clone())),
                        ])
                    })
                    .collect(),
            ),
        ));
    }
    util::map(pairs)
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

    fn req(method: Method, vars: BTreeMap<String, Value>, payload: Value) -> WireRequest {
        WireRequest {
            path: "message".to_string(),
            method,
            vars,
            payload,
        }
    }

    fn with_user(store: &Store, callsign: &str) {
        crate::admission::admit_connection(store, callsign).unwrap();
    }

    #[test]
    fn send_to_one_recipient_delivers_and_records_sent_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        with_user(&store, "W1AW");
        with_user(&store, "K9ABC");
        let payload = util::map([
            ("text", "hi".into()),
            ("to", Value::List(vec!["K9ABC".into()])),
        ]);
        let resp = handle(&store, "W1AW", &req(Method::Post, BTreeMap::new(), payload)).unwrap();
        let map = resp.payload.as_map().unwrap();
        assert_eq!(map["successes"].as_i64(), Some(1));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.messages["K9ABC"].len(), 1);
        assert_eq!(snapshot.messages["W1AW"].len(), 1);
    }

    #[test]
    fn send_to_unknown_recipient_is_reported_as_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        with_user(&store, "W1AW");
        let payload = util::map([
            ("text", "hi".into()),
            ("to", Value::List(vec!["NOBODY".into()])),
        ]);
        let resp = handle(&store, "W1AW", &req(Method::Post, BTreeMap::new(), payload)).unwrap();
        let map = resp.payload.as_map().unwrap();
        assert_eq!(map["successes"].as_i64(), Some(0));
        let failed = map["failed"].as_list().unwrap();
        assert_eq!(failed[0].as_str(), Some("NOBODY"));
    }

    #[test]
    fn broadcast_delivers_to_every_enabled_non_hidden_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        with_user(&store, "W1AW");
        with_user(&store, "K9ABC");
        let payload = util::map([("text", "hi all".into()), ("to", Value::List(vec!["ALL".into()]))]);
        let resp = handle(&store, "W1AW", &req(Method::Post, BTreeMap::new(), payload)).unwrap();
        let map = resp.payload.as_map().unwrap();
        assert_eq!(map["successes"].as_i64(), Some(2));
    }

    #[test]
    fn get_defaults_to_received_and_marks_retrieved() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        with_user(&store, "W1AW");
        with_user(&store, "K9ABC");
        let payload = util::map([("text", "hi".into()), ("to", Value::List(vec!["K9ABC".into()]))]);
        handle(&store, "W1AW", &req(Method::Post, BTreeMap::new(), payload)).unwrap();

        let resp = handle(&store, "K9ABC", &req(Method::Get, BTreeMap::new(), Value::Null)).unwrap();
        let list = resp.payload.as_list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].as_map().unwrap()["sender"].as_str(), Some("W1AW"));

        assert!(store.snapshot().messages["K9ABC"][0].retrieved);
    }

    #[test]
    fn fetch_attachments_defaults_to_omitted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        with_user(&store, "W1AW");
        with_user(&store, "K9ABC");
        let attachment = util::map([("name", "a.txt".into()), ("data", "payload".into())]);
        let payload = util::map([
            ("text", "hi".into()),
            ("to", Value::List(vec!["K9ABC".into()])),
            ("attachments", Value::List(vec![attachment])),
        ]);
        handle(&store, "W1AW", &req(Method::Post, BTreeMap::new(), payload)).unwrap();

        let resp = handle(&store, "K9ABC", &req(Method::Get, BTreeMap::new(), Value::Null)).unwrap();
        let list = resp.payload.as_list().unwrap();
        assert!(!list[0].as_map().unwrap().contains_key("attachments"));
    }
}
