//! Job handler: `GET`/`POST`/`DELETE` on `/job` (§4.D, §4.F).
//!
//! Submission only enqueues — the background worker that actually pops
//! `job_queue` and drives the orchestrator lives in the daemon binary, not
//! here. `quick=y` busy-waits on the store reaching a terminal status for
//! the submitted job, exactly as if a worker elsewhere were making progress.
//! `DELETE` cancels a job that hasn't started yet by dequeuing it; a job a
//! runner has already picked up can only be torn down by the orchestrator
//! that owns its container.

use crate::util;
use bbs_core::job::{Command, InputFile, JobStatus};
use bbs_core::{Job, Value};
use bbs_error::{BbsError, ErrorCode};
use bbs_store::Store;
use bbs_wire::{Method, WireRequest, WireResponse};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::time::Duration;

pub fn handle(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    if !store.snapshot().config.jobs_enabled {
        return Err(BbsError::new(ErrorCode::Validation, "the job subsystem is disabled"));
    }
    match req.method {
        Method::Get => handle_get(store, caller, req),
        Method::Post => handle_post(store, caller, req),
        Method::Delete => handle_delete(store, caller, req),
        _ => Err(BbsError::new(ErrorCode::UnknownMethod, "job supports GET, POST and DELETE")),
    }
}

fn parse_command(payload: &BTreeMap<String, Value>) -> Result<Command, BbsError> {
    match payload.get("cmd") {
        Some(Value::String(s)) => Ok(Command::Shell(s.clone())),
        Some(Value::List(items)) => {
            let argv = items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| BbsError::new(ErrorCode::Validation, "cmd list entries must be strings"))?;
            if argv.is_empty() {
                return Err(BbsError::new(ErrorCode::Validation, "cmd list must not be empty"));
            }
            Ok(Command::Argv(argv))
        }
        _ => Err(BbsError::new(ErrorCode::Validation, "job requires a cmd")),
    }
}

fn parse_env(payload: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    match payload.get("env").and_then(Value::as_map) {
        Some(m) => m
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        None => BTreeMap::new(),
    }
}

fn parse_files(payload: &BTreeMap<String, Value>) -> Result<Vec<InputFile>, BbsError> {
    let Some(items) = payload.get("files").and_then(Value::as_list) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|v| {
            let m = v
                .as_map()
                .ok_or_else(|| BbsError::new(ErrorCode::Validation, "each file entry must be a map"))?;
            let name = m
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| BbsError::new(ErrorCode::Validation, "file entry requires a name"))?
                .to_string();
            let data = match m.get("data") {
                Some(Value::Bytes(b)) => b.clone(),
                Some(Value::String(s)) => s.clone().into_bytes(),
                _ => return Err(BbsError::new(ErrorCode::Validation, "file entry requires data")),
            };
            let root_owned = m.get("root_owned").map(|v| v.as_yes_no(false)).unwrap_or(false);
            Ok(InputFile { name, data, root_owned })
        })
        .collect()
}

/// Gzip the caller's own snapshot as JSON, per the `db=y` request flag, so
/// the job can read its owner's view of the store as `user-db.json.gz`.
fn db_snapshot_file(store: &Store, caller: &str) -> Result<InputFile, BbsError> {
    let snapshot = store.snapshot();
    let user = snapshot
        .users
        .get(caller)
        .ok_or_else(|| BbsError::new(ErrorCode::Unauthorized, "caller has no user record"))?;
    let bulletins: Vec<_> = snapshot.bulletins.values().collect();
    let messages = snapshot.messages.get(caller).cloned().unwrap_or_default();
    let json = serde_json::json!({
        "user": user,
        "messages": messages,
        "bulletins": bulletins,
    });
    let bytes = serde_json::to_vec(&json).map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to serialise db snapshot").with_source(e))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&bytes)
        .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to gzip db snapshot").with_source(e))?;
    let gz = encoder
        .finish()
        .map_err(|e| BbsError::new(ErrorCode::Fatal, "failed to gzip db snapshot").with_source(e))?;

    Ok(InputFile {
        name: "user-db.json.gz".to_string(),
        data: gz,
        root_owned: false,
    })
}

fn handle_post(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let payload = req
        .payload
        .as_map()
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "job payload must be a map"))?;
    let cmd = parse_command(payload)?;
    let env = parse_env(payload);
    let mut files = parse_files(payload)?;
    if payload.get("db").map(|v| v.as_yes_no(false)).unwrap_or(false) {
        files.push(db_snapshot_file(store, caller)?);
    }

    let job_id = store.transaction(|root| {
        if !root.users.get(caller).map(|u| u.enabled).unwrap_or(false) {
            return Err(BbsError::new(ErrorCode::Unauthorized, "caller is not an enabled user"));
        }
        let id = root.allocate_job_id();
        let job = Job::new(id, caller, cmd.clone(), env.clone(), files.clone(), Utc::now());
        root.jobs.insert(id, job);
        root.job_queue
            .enqueue(id)
            .map_err(|e| BbsError::new(ErrorCode::TransientStoreConflict, e.to_string()))?;
        root.record_user_job(caller, id);
        Ok(id)
    })?;

    if util::var_yes_no(&req.vars, "quick", false) {
        let deadline = std::time::Instant::now() + Duration::from_secs(bbs_core::QUICK_JOB_TIMEOUT_SECS);
        loop {
            let snapshot = store.snapshot();
            if let Some(job) = snapshot.jobs.get(&job_id) {
                if job.is_finished() {
                    return WireResponse::new(200, job_value(job));
                }
            }
            if std::time::Instant::now() >= deadline {
                return WireResponse::new(202, util::map([("job_id", Value::I64(job_id as i64))]));
            }
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    WireResponse::new(201, util::map([("job_id", Value::I64(job_id as i64))]))
}

fn handle_get(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let snapshot = store.snapshot();
    let requested_id = util::path_tail(&req.path)
        .and_then(|s| s.parse().ok())
        .or_else(|| util::var_i64(&req.vars, "id").map(|n| n.max(0) as u64));

    if let Some(id) = requested_id {
        let job = snapshot
            .jobs
            .get(&id)
            .ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such job"))?;
        if job.owner != caller {
            return Err(BbsError::new(ErrorCode::Forbidden, "not the job's owner"));
        }
        return WireResponse::new(200, job_value(job));
    }

    let id_only = util::var_yes_no(&req.vars, "id_only", false);
    let ids = snapshot.user_jobs.get(caller).cloned().unwrap_or_default();
    let list = if id_only {
        ids.into_iter().map(|id| Value::I64(id as i64)).collect()
    } else {
        ids.into_iter()
            .filter_map(|id| snapshot.jobs.get(&id))
            .map(job_value)
            .collect()
    };
    WireResponse::new(200, Value::List(list))
}

/// Cancel a job that hasn't started yet. A job already picked up by a
/// runner can't be cancelled here — only the orchestrator that owns its
/// container can tear it down, and that's the daemon's concern, not the
/// store's.
fn handle_delete(store: &Store, caller: &str, req: &WireRequest) -> Result<WireResponse, BbsError> {
    let id = util::path_tail(&req.path)
        .and_then(|s| s.parse().ok())
        .or_else(|| util::var_i64(&req.vars, "id").map(|n| n.max(0) as u64))
        .ok_or_else(|| BbsError::new(ErrorCode::Validation, "job cancellation requires an id"))?;

    store.transaction(|root| {
        let job = root.jobs.get(&id).ok_or_else(|| BbsError::new(ErrorCode::NotFound, "no such job"))?;
        if job.owner != caller {
            return Err(BbsError::new(ErrorCode::Forbidden, "not the job's owner"));
        }
        if !job.status.queueable() {
            return Err(BbsError::new(ErrorCode::Validation, "job already started and can't be cancelled here"));
        }
        root.job_queue.remove(id);
        if let Some(job) = root.jobs.get_mut(&id) {
            job.status = JobStatus::Failed;
            job.finished_at = Some(Utc::now());
        }
        Ok(())
    })?;
    WireResponse::new(200, Value::Null)
}

fn job_value(j: &Job) -> Value {
    let cmd = match &j.cmd {
        Command::Shell(s) => Value::String(s.clone()),
        Command::Argv(argv) => Value::List(argv.iter().map(|s| s.as_str().into()).collect()),
    };
    util::map([
        ("id", Value::I64(j.id as i64)),
        ("owner", j.owner.as_str().into()),
        ("cmd", cmd),
        ("status", format!("{:?}", j.status).to_uppercase().as_str().into()),
        ("created_at", util::dt(j.created_at)),
        ("started_at", j.started_at.map(util::dt).unwrap_or(Value::Null)),
        ("finished_at", j.finished_at.map(util::dt).unwrap_or(Value::Null)),
        ("return_code", Value::I64(j.return_code as i64)),
        ("stdout", Value::Bytes(j.stdout.clone())),
        ("stderr", Value::Bytes(j.stderr.clone())),
    ])
}
