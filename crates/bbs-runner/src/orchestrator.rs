//! Per-user container orchestrator (§4.G).

use crate::engine::ContainerEngine;
use bbs_core::{Command, InputFile};
use bbs_error::{BbsError, ErrorCode};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

/// Shell script uploaded to `/root/scripts` and exec'd as root on a
/// container's first job: creates the job's user, their home directory, and
/// the shared `/artifact_output` directory.
const SETUP_SCRIPT: &str = "#!/bin/sh\nset -e\nid -u \"$1\" >/dev/null 2>&1 || useradd -m \"$1\"\nmkdir -p /artifact_output\nchmod 1777 /artifact_output\n";

/// Policy options mirrored from `bbs_core::JobsConfig`, driving pool sizing
/// and per-job limits (§4.G).
#[derive(Debug, Clone)]
pub struct PolicyOptions {
    /// Default per-job timeout in seconds.
    pub default_timeout_secs: u64,
    /// Hard upper bound on any job's timeout in seconds.
    pub max_timeout_secs: u64,
    /// Base image for new per-user containers.
    pub image_name: String,
    /// Maximum number of concurrently in-process runners.
    pub max_active_jobs: usize,
    /// Seconds of inactivity after which an idle container is evicted.
    pub container_keepalive_secs: u64,
    /// Prefix applied to every container name this server manages.
    pub name_prefix: String,
}

impl From<bbs_core::JobsConfig> for PolicyOptions {
    fn from(cfg: bbs_core::JobsConfig) -> Self {
        Self {
            default_timeout_secs: cfg.default_timeout_secs,
            max_timeout_secs: cfg.max_timeout_secs,
            image_name: cfg.image,
            max_active_jobs: cfg.max_active_jobs,
            container_keepalive_secs: cfg.container_keepalive_secs,
            name_prefix: cfg.name_prefix,
        }
    }
}

/// Result of one runner's exec, handed back from its thread.
#[derive(Debug, Clone, Default)]
pub struct RunnerOutcome {
    /// Process exit code.
    pub return_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Gzipped tar bytes captured from `/artifact_output/<job_id>.tar.gz`.
    pub artifact_archive: Vec<u8>,
    /// Whether the runner itself failed (container/exec error) rather than
    /// the job's command simply returning non-zero.
    pub failed: bool,
}

struct RunnerSlot {
    container_name: String,
    rx: mpsc::Receiver<RunnerOutcome>,
}

/// Request to start a job's runner, passed to [`Orchestrator::start_runner`].
pub struct RunnerRequest {
    /// Job id, used to name its artifact directory and archive.
    pub job_id: u64,
    /// Owner callsign; the container is named from this.
    pub owner: String,
    /// Command to execute.
    pub cmd: Command,
    /// Extra environment merged at exec time.
    pub env: BTreeMap<String, String>,
    /// Input files to inject before exec.
    pub files: Vec<InputFile>,
}

/// Maintains one container per user, a lock-protected activity map, and the
/// in-flight runner threads for active jobs (§4.G/§5).
pub struct Orchestrator<E: ContainerEngine + 'static> {
    engine: Arc<E>,
    policy: PolicyOptions,
    started: AtomicBool,
    containers: Mutex<BTreeMap<String, Instant>>,
    initialized: Mutex<BTreeSet<String>>,
    runners: Mutex<BTreeMap<u64, RunnerSlot>>,
}

impl<E: ContainerEngine + 'static> Orchestrator<E> {
    /// Build a started orchestrator over `engine` with the given policy.
    pub fn new(engine: E, policy: PolicyOptions) -> Self {
        Self {
            engine: Arc::new(engine),
            policy,
            started: AtomicBool::new(true),
            containers: Mutex::new(BTreeMap::new()),
            initialized: Mutex::new(BTreeSet::new()),
            runners: Mutex::new(BTreeMap::new()),
        }
    }

    /// The container name for `username`: `<prefix><lowercased username>`.
    pub fn container_name(&self, username: &str) -> String {
        format!("{}{}", self.policy.name_prefix, username.to_lowercase())
    }

    /// `started ∧ in_process_runners < max_active_jobs` (§4.G).
    pub fn runners_available(&self) -> bool {
        self.started.load(Ordering::SeqCst)
            && self.runners.lock().expect("runners lock poisoned").len() < self.policy.max_active_jobs
    }

    /// Number of runners currently executing.
    pub fn active_runner_count(&self) -> usize {
        self.runners.lock().expect("runners lock poisoned").len()
    }

    fn touch(&self, name: &str) {
        self.containers
            .lock()
            .expect("containers lock poisoned")
            .insert(name.to_string(), Instant::now());
    }

    fn ensure_container(&self, name: &str, owner: &str) -> Result<(), BbsError> {
        let already = self.containers.lock().expect("containers lock poisoned").contains_key(name);
        if already {
            self.touch(name);
            return Ok(());
        }
        let mut env = BTreeMap::new();
        env.insert("PACKETSERVER_VERSION".to_string(), env!("CARGO_PKG_VERSION").to_string());
        env.insert("PACKETSERVER_USER".to_string(), owner.to_string());
        self.engine.create(name, &self.policy.image_name, &env)?;
        self.engine.start(name)?;
        self.touch(name);

        let initialized = self.initialized.lock().expect("initialized lock poisoned").contains(name);
        if !initialized {
            let script_tar = tar_single_file("setup.sh", SETUP_SCRIPT.as_bytes(), true)?;
            self.engine.put_archive(name, "/root/scripts", &script_tar)?;
            let out = self.engine.exec(
                name,
                &["sh".to_string(), "/root/scripts/setup.sh".to_string(), owner.to_string()],
                "root",
                "/root",
                &BTreeMap::new(),
            )?;
            if out.return_code != 0 {
                // First-run setup failing is fatal for this container: tear it
                // down so the next job attempts a clean create.
                let _ = self.engine.remove(name);
                self.containers.lock().expect("containers lock poisoned").remove(name);
                return Err(BbsError::new(ErrorCode::RunnerCreateFailed, "first-run container setup failed")
                    .with_context("container", name.to_string())
                    .with_context("return_code", out.return_code));
            }
            self.initialized.lock().expect("initialized lock poisoned").insert(name.to_string());
        }
        Ok(())
    }

    fn prepare_job(&self, name: &str, owner: &str, job_id: u64, files: &[InputFile]) -> Result<String, BbsError> {
        let job_dir = format!("/home/{owner}/.packetserver/{job_id}");
        let artifacts_dir = format!("{job_dir}/artifacts");
        let out = self.engine.exec(
            name,
            &[
                "sh".to_string(),
                "-c".to_string(),
                format!("mkdir -p '{artifacts_dir}' && chown -R {owner} '{job_dir}'"),
            ],
            "root",
            "/root",
            &BTreeMap::new(),
        )?;
        if out.return_code != 0 {
            return Err(BbsError::new(ErrorCode::RunnerCreateFailed, "job directory setup failed")
                .with_context("container", name.to_string()));
        }
        for file in files {
            let tar_bytes = tar_single_file(&file.name, &file.data, file.root_owned)?;
            self.engine.put_archive(name, &job_dir, &tar_bytes)?;
            if !file.root_owned {
                let _ = self.engine.exec(
                    name,
                    &["chown".to_string(), owner.to_string(), format!("{job_dir}/{}", file.name)],
                    "root",
                    "/root",
                    &BTreeMap::new(),
                );
            }
        }
        Ok(job_dir)
    }

    /// Start a runner for `req`, creating or reusing the owner's container,
    /// preparing its job directory, and spawning the exec thread. Returns
    /// once the runner is in-flight; its outcome is collected later by
    /// [`Orchestrator::poll_finished`].
    pub fn start_runner(&self, req: RunnerRequest) -> Result<(), BbsError> {
        let name = self.container_name(&req.owner);
        self.ensure_container(&name, &req.owner)?;
        let job_dir = self.prepare_job(&name, &req.owner, req.job_id, &req.files)?;

        let argv = match req.cmd {
            Command::Shell(s) => vec!["sh".to_string(), "-c".to_string(), s],
            Command::Argv(v) => v,
        };
        let mut env = req.env;
        env.insert("PACKETSERVER_JOBID".to_string(), req.job_id.to_string());

        let (tx, rx) = mpsc::channel();
        let engine = Arc::clone(&self.engine);
        let owner = req.owner.clone();
        let container = name.clone();
        let job_id = req.job_id;
        std::thread::spawn(move || {
            let exec_result = engine.exec(&container, &argv, &owner, &job_dir, &env);
            let outcome = match exec_result {
                Ok(out) => {
                    let end_script = format!(
                        "tar czf /artifact_output/{job_id}.tar.gz -C '{job_dir}/artifacts' ."
                    );
                    let end = engine.exec(&container, &["sh".to_string(), "-c".to_string(), end_script], "root", "/root", &BTreeMap::new());
                    let artifact = end
                        .ok()
                        .filter(|r| r.return_code == 0)
                        .and_then(|_| engine.get_archive(&container, &format!("/artifact_output/{job_id}.tar.gz")).ok())
                        .unwrap_or_default();
                    RunnerOutcome {
                        return_code: out.return_code,
                        stdout: out.stdout,
                        stderr: out.stderr,
                        artifact_archive: artifact,
                        failed: false,
                    }
                }
                Err(err) => RunnerOutcome {
                    return_code: -1,
                    stdout: Vec::new(),
                    stderr: err.to_string().into_bytes(),
                    artifact_archive: Vec::new(),
                    failed: true,
                },
            };
            let _ = tx.send(outcome);
        });

        self.runners
            .lock()
            .expect("runners lock poisoned")
            .insert(req.job_id, RunnerSlot { container_name: name, rx });
        Ok(())
    }

    /// Drain every runner whose exec has finished, touching its container's
    /// activity and removing it from the in-flight set.
    pub fn poll_finished(&self) -> Vec<(u64, RunnerOutcome)> {
        let mut runners = self.runners.lock().expect("runners lock poisoned");
        let mut done = Vec::new();
        let finished_ids: Vec<u64> = runners
            .iter()
            .filter_map(|(id, slot)| slot.rx.try_recv().ok().map(|outcome| (*id, outcome)))
            .map(|(id, outcome)| {
                done.push((id, outcome));
                id
            })
            .collect();
        for id in finished_ids {
            if let Some(slot) = runners.remove(&id) {
                self.touch(&slot.container_name);
            }
        }
        done
    }

    /// Remove containers idle longer than `container_keepalive_secs` with no
    /// in-flight runner referencing them.
    pub fn evict_idle_containers(&self) {
        let referenced: BTreeSet<String> = self
            .runners
            .lock()
            .expect("runners lock poisoned")
            .values()
            .map(|slot| slot.container_name.clone())
            .collect();
        let keepalive = Duration::from_secs(self.policy.container_keepalive_secs);
        let expired: Vec<String> = {
            let containers = self.containers.lock().expect("containers lock poisoned");
            containers
                .iter()
                .filter(|(name, last_activity)| {
                    !referenced.contains(*name) && last_activity.elapsed() > keepalive
                })
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in expired {
            if self.engine.stop(&name).is_ok() {
                let _ = self.engine.remove(&name);
            }
            self.containers.lock().expect("containers lock poisoned").remove(&name);
            self.initialized.lock().expect("initialized lock poisoned").remove(&name);
        }
    }

    /// Remove any engine container carrying our prefix that isn't in our
    /// live map — run periodically (§4.G: "every ~10 minutes").
    pub fn scan_orphans(&self) -> Result<(), BbsError> {
        let live = self.containers.lock().expect("containers lock poisoned");
        for name in self.engine.list(&self.policy.name_prefix)? {
            if !live.contains_key(&name) {
                let _ = self.engine.remove(&name);
            }
        }
        Ok(())
    }

    /// Signal shutdown: flips the started flag and touches `/root/ENDNOW`
    /// inside every tracked container so its idle loop exits.
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        let names: Vec<String> = self.containers.lock().expect("containers lock poisoned").keys().cloned().collect();
        for name in names {
            let _ = self.engine.exec(
                &name,
                &["touch".to_string(), "/root/ENDNOW".to_string()],
                "root",
                "/root",
                &BTreeMap::new(),
            );
        }
    }
}

/// Build a minimal tar archive containing a single file, for
/// [`ContainerEngine::put_archive`] calls that only need to ship one file
/// (a setup script, one job input file).
fn tar_single_file(name: &str, data: &[u8], root_owned: bool) -> Result<Vec<u8>, BbsError> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(if root_owned { 0o600 } else { 0o644 });
    header.set_cksum();
    builder
        .append_data(&mut header, name, data)
        .map_err(|e| BbsError::new(ErrorCode::RunnerCreateFailed, "failed to build tar archive").with_source(e))?;
    builder
        .into_inner()
        .map_err(|e| BbsError::new(ErrorCode::RunnerCreateFailed, "failed to finish tar archive").with_source(e))
}
