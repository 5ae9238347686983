//! The job-queue worker thread (§4.F steps 1-2, §5 "one server worker
//! thread drives the job queue at the cadence above").

use crate::cadence::Cadence;
use bbs_core::job::JobStatus;
use bbs_error::BbsError;
use bbs_runner::{ContainerEngine, Orchestrator, RunnerRequest};
use bbs_store::Store;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Base cadence the worker thread wakes up at; each wake checks [`Cadence::due`]
/// before doing any store work.
const BASE_TICK: Duration = Duration::from_millis(500);

/// Drains `job_queue` into the orchestrator and collects finished runners,
/// at the dynamic interval `cadence` tracks.
pub struct JobWorker<E: ContainerEngine + 'static> {
    store: Arc<Store>,
    orchestrator: Arc<Orchestrator<E>>,
    cadence: Arc<Cadence>,
}

impl<E: ContainerEngine + 'static> JobWorker<E> {
    /// Build a worker over the given store and orchestrator, sharing
    /// `cadence` with the connection threads that arm it.
    pub fn new(store: Arc<Store>, orchestrator: Arc<Orchestrator<E>>, cadence: Arc<Cadence>) -> Self {
        Self { store, orchestrator, cadence }
    }

    /// Run forever at [`BASE_TICK`], calling [`Self::tick`] whenever the
    /// cadence says a check is due. Intended to be the body of its own
    /// thread.
    pub fn run(&self) {
        loop {
            std::thread::sleep(BASE_TICK);
            if !self.cadence.due() {
                continue;
            }
            if let Err(err) = self.tick() {
                tracing::warn!(error = %err, "job worker tick failed");
            }
        }
    }

    /// One pass: drain what the orchestrator can accept, then collect what
    /// it has finished. Exposed for tests; `run` is the production loop.
    pub fn tick(&self) -> Result<(), BbsError> {
        self.drain_queue()?;
        self.collect_finished()?;
        Ok(())
    }

    fn drain_queue(&self) -> Result<(), BbsError> {
        loop {
            if !self.orchestrator.runners_available() {
                break;
            }
            let Some(job_id) = self.store.snapshot().job_queue.peek() else {
                break;
            };
            let Some(job) = self.store.snapshot().jobs.get(&job_id).cloned() else {
                // Queue referenced a job id that no longer exists; drop it
                // rather than spin forever on a dead entry.
                self.store.transaction(|root| {
                    root.job_queue.remove(job_id);
                    Ok(())
                })?;
                continue;
            };

            let request = RunnerRequest {
                job_id,
                owner: job.owner.clone(),
                cmd: job.cmd.clone(),
                env: job.env.clone(),
                files: job.files.clone(),
            };

            match self.orchestrator.start_runner(request) {
                Ok(()) => {
                    self.store.transaction(|root| {
                        root.job_queue.remove(job_id);
                        if let Some(j) = root.jobs.get_mut(&job_id) {
                            j.status = JobStatus::Running;
                            j.started_at = Some(Utc::now());
                        }
                        Ok(())
                    })?;
                }
                Err(err) => {
                    // Leave the id in the queue; retried next tick (§4.F
                    // "if a runner creation throws, the job id is not
                    // removed from the queue").
                    tracing::warn!(job_id, error = %err, "runner creation failed, will retry");
                    break;
                }
            }
        }
        Ok(())
    }

    fn collect_finished(&self) -> Result<(), BbsError> {
        for (job_id, outcome) in self.orchestrator.poll_finished() {
            self.store.transaction(|root| {
                if let Some(j) = root.jobs.get_mut(&job_id) {
                    j.stdout = outcome.stdout.clone();
                    j.stderr = outcome.stderr.clone();
                    j.return_code = outcome.return_code;
                    j.artifact_archive = outcome.artifact_archive.clone();
                    j.finished_at = Some(Utc::now());
                    j.status = if outcome.failed || outcome.return_code != 0 {
                        JobStatus::Failed
                    } else {
                        JobStatus::Successful
                    };
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_core::{Command, Job};
    use bbs_runner::PolicyOptions;
    use bbs_store::FileBackend;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeEngine {
        execs: StdMutex<u32>,
    }

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
        ) -> Result<bbs_runner::ExecOutput, BbsError> {
            *self.execs.lock().unwrap() += 1;
            Ok(bbs_runner::ExecOutput { return_code: 0, stdout: b"ok".to_vec(), stderr: Vec::new() })
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

    fn opened_store(dir: &std::path::Path) -> Arc<Store> {
        let store = Arc::new(Store::new(FileBackend::new(dir.join("store.json"))));
        store.open().unwrap();
        store
    }

    #[test]
    fn drain_queue_starts_a_runner_and_marks_the_job_running() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let job_id = store
            .transaction(|root| {
                let id = root.allocate_job_id();
                let job = Job::new(id, "W1AW", Command::Shell("echo hi".into()), Default::default(), vec![], Utc::now());
                root.jobs.insert(id, job);
                root.job_queue.enqueue(id).unwrap();
                Ok(id)
            })
            .unwrap();

        let orchestrator = Arc::new(Orchestrator::new(FakeEngine::default(), policy()));
        let worker = JobWorker::new(Arc::clone(&store), orchestrator, Arc::new(Cadence::new()));
        worker.tick().unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.job_queue.is_empty());
        assert_eq!(snapshot.jobs[&job_id].status, JobStatus::Running);
        assert!(snapshot.jobs[&job_id].started_at.is_some());
    }

    #[test]
    fn collect_finished_marks_job_successful() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let job_id = store
            .transaction(|root| {
                let id = root.allocate_job_id();
                let job = Job::new(id, "W1AW", Command::Shell("echo hi".into()), Default::default(), vec![], Utc::now());
                root.jobs.insert(id, job);
                root.job_queue.enqueue(id).unwrap();
                Ok(id)
            })
            .unwrap();

        let orchestrator = Arc::new(Orchestrator::new(FakeEngine::default(), policy()));
        let worker = JobWorker::new(Arc::clone(&store), Arc::clone(&orchestrator), Arc::new(Cadence::new()));
        worker.tick().unwrap();

        for _ in 0..200 {
            if orchestrator.active_runner_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        worker.tick().unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.jobs[&job_id].status, JobStatus::Successful);
        assert_eq!(snapshot.jobs[&job_id].return_code, 0);
    }

    #[test]
    fn stale_queue_entry_with_no_matching_job_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        store
            .transaction(|root| {
                root.job_queue.enqueue(999).unwrap();
                Ok(())
            })
            .unwrap();

        let orchestrator = Arc::new(Orchestrator::new(FakeEngine::default(), policy()));
        let worker = JobWorker::new(Arc::clone(&store), orchestrator, Arc::new(Cadence::new()));
        worker.tick().unwrap();

        assert!(store.snapshot().job_queue.is_empty());
    }
}
