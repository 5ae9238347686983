//! The container engine interface (§6, consumed) and a podman-backed
//! implementation of it.

use bbs_error::{BbsError, ErrorCode};
use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command as ProcessCommand, Stdio};

/// Output of a single [`ContainerEngine::exec`] call.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Process exit code.
    pub return_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

/// The container engine operations the orchestrator needs (§6). Any
/// OCI-compatible engine can satisfy this; [`PodmanEngine`] shells out to
/// the `podman` CLI.
pub trait ContainerEngine: Send + Sync {
    /// Create (but do not start) a container named `name` from `image`,
    /// with the given environment, entrypointed to idle until
    /// `/root/ENDNOW` appears.
    fn create(&self, name: &str, image: &str, env: &BTreeMap<String, String>) -> Result<(), BbsError>;

    /// Start a previously created container.
    fn start(&self, name: &str) -> Result<(), BbsError>;

    /// Stop a running container.
    fn stop(&self, name: &str) -> Result<(), BbsError>;

    /// Remove a container, running or not.
    fn remove(&self, name: &str) -> Result<(), BbsError>;

    /// Execute `argv` as `user` inside `name`, from `workdir`, with `env`
    /// merged into the container's environment.
    fn exec(
        &self,
        name: &str,
        argv: &[String],
        user: &str,
        workdir: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecOutput, BbsError>;

    /// Upload a tar stream into the container, extracted at `dest`.
    fn put_archive(&self, name: &str, dest: &str, tar_bytes: &[u8]) -> Result<(), BbsError>;

    /// Read a single file at `path` inside the container and return its raw
    /// bytes (used to retrieve the already-gzipped artifact tar the
    /// job-end script produces).
    fn get_archive(&self, name: &str, path: &str) -> Result<Vec<u8>, BbsError>;

    /// List the names of every container this engine knows about whose name
    /// starts with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, BbsError>;
}

/// [`ContainerEngine`] backed by the `podman` CLI.
pub struct PodmanEngine {
    binary: String,
}

impl Default for PodmanEngine {
    fn default() -> Self {
        Self { binary: "podman".to_string() }
    }
}

impl PodmanEngine {
    /// Use a specific `podman`-compatible binary (for tests, a stub script).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn run(&self, args: &[&str]) -> Result<ExecOutput, BbsError> {
        let output = ProcessCommand::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| {
                BbsError::new(ErrorCode::RunnerCreateFailed, "failed to spawn container engine binary")
                    .with_source(e)
                    .with_context("binary", self.binary.clone())
            })?;
        Ok(ExecOutput {
            return_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn run_with_stdin(&self, args: &[&str], input: &[u8]) -> Result<ExecOutput, BbsError> {
        let mut child = ProcessCommand::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BbsError::new(ErrorCode::RunnerCreateFailed, "failed to spawn container engine binary")
                    .with_source(e)
            })?;
        {
            let stdin = child.stdin.as_mut().ok_or_else(|| {
                BbsError::new(ErrorCode::RunnerCreateFailed, "container engine stdin unavailable")
            })?;
            stdin.write_all(input).map_err(|e| {
                BbsError::new(ErrorCode::RunnerExecFailed, "failed to write container engine stdin").with_source(e)
            })?;
        }
        let output = child.wait_with_output().map_err(|e| {
            BbsError::new(ErrorCode::RunnerExecFailed, "failed waiting on container engine process").with_source(e)
        })?;
        Ok(ExecOutput {
            return_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn ensure_zero(result: ExecOutput, code: ErrorCode, action: &str) -> Result<ExecOutput, BbsError> {
        if result.return_code == 0 {
            Ok(result)
        } else {
            Err(BbsError::new(code, format!("{action} exited non-zero"))
                .with_context("return_code", result.return_code)
                .with_context("stderr", String::from_utf8_lossy(&result.stderr).to_string()))
        }
    }
}

impl ContainerEngine for PodmanEngine {
    fn create(&self, name: &str, image: &str, env: &BTreeMap<String, String>) -> Result<(), BbsError> {
        let mut args = vec!["create".to_string(), "--name".to_string(), name.to_string()];
        for (k, v) in env {
            args.push("-e".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(image.to_string());
        args.push("sh".to_string());
        args.push("-c".to_string());
        args.push("while [ ! -f /root/ENDNOW ]; do sleep 1; done".to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&arg_refs)?;
        Self::ensure_zero(out, ErrorCode::RunnerCreateFailed, "container create").map(|_| ())
    }

    fn start(&self, name: &str) -> Result<(), BbsError> {
        let out = self.run(&["start", name])?;
        Self::ensure_zero(out, ErrorCode::RunnerCreateFailed, "container start").map(|_| ())
    }

    fn stop(&self, name: &str) -> Result<(), BbsError> {
        let out = self.run(&["stop", name])?;
        Self::ensure_zero(out, ErrorCode::RunnerExecFailed, "container stop").map(|_| ())
    }

    fn remove(&self, name: &str) -> Result<(), BbsError> {
        let out = self.run(&["rm", "-f", name])?;
        Self::ensure_zero(out, ErrorCode::RunnerExecFailed, "container remove").map(|_| ())
    }

    fn exec(
        &self,
        name: &str,
        argv: &[String],
        user: &str,
        workdir: &str,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecOutput, BbsError> {
        let mut args = vec![
            "exec".to_string(),
            "--user".to_string(),
            user.to_string(),
            "--workdir".to_string(),
            workdir.to_string(),
        ];
        for (k, v) in env {
            args.push("-e".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(name.to_string());
        args.extend(argv.iter().cloned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)
    }

    fn put_archive(&self, name: &str, dest: &str, tar_bytes: &[u8]) -> Result<(), BbsError> {
        let args = ["exec", "-i", name, "tar", "-x", "-C", dest];
        let out = self.run_with_stdin(&args, tar_bytes)?;
        Self::ensure_zero(out, ErrorCode::RunnerExecFailed, "archive upload").map(|_| ())
    }

    fn get_archive(&self, name: &str, path: &str) -> Result<Vec<u8>, BbsError> {
        let args = ["exec", name, "cat", path];
        let out = self.run(&args)?;
        let out = Self::ensure_zero(out, ErrorCode::RunnerExecFailed, "archive download")?;
        Ok(out.stdout)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BbsError> {
        let out = self.run(&["ps", "-a", "--format", "{{.Names}}"])?;
        let out = Self::ensure_zero(out, ErrorCode::RunnerExecFailed, "container list")?;
        let names = String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::to_string)
            .filter(|n| n.starts_with(prefix))
            .collect();
        Ok(names)
    }
}
