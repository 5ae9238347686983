//! The `Job` entity and its status lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A job's lifecycle status. Transitions are driven by the job queue worker
/// (§4.F) and the runner/orchestrator (§4.G); handlers only ever read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Constructed but not yet queued.
    Created,
    /// Sitting in `job_queue`, waiting for a free runner slot.
    Queued,
    /// The orchestrator is creating or preparing a runner for this job.
    Starting,
    /// The job's command is executing in its container.
    Running,
    /// The command has returned; capturing output and artifacts.
    Stopping,
    /// Terminal: exited zero and was captured successfully.
    Successful,
    /// Terminal: exited non-zero, or the runner failed.
    Failed,
    /// Terminal: exceeded its timeout without reaching a terminal state.
    TimedOut,
}

impl JobStatus {
    /// Whether this status is terminal (`finished_at` is set once reached).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Successful | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// Whether a job with this status may legitimately still sit in
    /// `job_queue` (§3 Job invariants: only CREATED or QUEUED).
    pub fn queueable(&self) -> bool {
        matches!(self, JobStatus::Created | JobStatus::Queued)
    }
}

/// Command to run: either a shell string or an argv sequence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    /// Run via `sh -c <string>`.
    Shell(String),
    /// Run directly as argv (no shell involved).
    Argv(Vec<String>),
}

/// One input file to be injected into the job's container before exec.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InputFile {
    /// Destination file name inside the job directory.
    pub name: String,
    /// File bytes.
    pub data: Vec<u8>,
    /// If true, the file is left root-owned instead of chowned to the job's
    /// user inside the container.
    pub root_owned: bool,
}

/// A queued or executed job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Dense integer id, assigned from `job_counter`. Never reused.
    pub id: u64,
    /// Uppercase callsign of the submitting user.
    pub owner: String,
    /// Command to execute.
    pub cmd: Command,
    /// Extra environment variables merged in at exec time.
    pub env: std::collections::BTreeMap<String, String>,
    /// Input files to inject before exec.
    pub files: Vec<InputFile>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the orchestrator begins creating/reusing a runner.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the job reaches a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Process exit code, valid once finished.
    pub return_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Gzipped tar archive captured from `/artifact_output/<id>.tar.gz`.
    pub artifact_archive: Vec<u8>,
}

impl Job {
    /// Construct a freshly created (not yet queued) job.
    pub fn new(
        id: u64,
        owner: impl Into<String>,
        cmd: Command,
        env: std::collections::BTreeMap<String, String>,
        files: Vec<InputFile>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner: owner.into(),
            cmd,
            env,
            files,
            created_at: now,
            started_at: None,
            finished_at: None,
            status: JobStatus::Created,
            return_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            artifact_archive: Vec::new(),
        }
    }

    /// Whether `finished_at` has been set, per the §3 invariant that status
    /// is terminal exactly when `finished_at` is set.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
