//! Skill Sandbox: interpreter discovery and time-bounded script execution.
//!
//! [`SandboxProvider`] is the seam between the registry and whatever
//! isolation backend runs skill code. [`VenvSandbox`] is the default backend
//! and runs the per-skill Python virtual environment as a child process.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::ErrorKind;
use crate::guard::VENV_DIR;

/// How long to keep draining pipes after a timed-out child was killed.
/// Grandchildren may hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Result type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a single script invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScriptExecutionResult {
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            returncode: -1,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// `None` for a completed run, whatever its exit status.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        if self.timed_out {
            Some(ErrorKind::Timeout)
        } else if self.error.is_some() {
            Some(ErrorKind::Execution)
        } else {
            None
        }
    }

    /// True when the process ran to completion with exit status 0.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.returncode == 0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Locate the skill's isolated interpreter. Absence is a valid outcome.
    fn find_interpreter(&self, skill_dir: &Path) -> Option<PathBuf>;

    /// Run `script` as inline code with `cwd` as working directory.
    async fn execute(
        &self,
        interpreter: &Path,
        script: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> ScriptExecutionResult;

    /// Create the isolated environment inside `skill_dir`.
    async fn provision(&self, skill_dir: &Path) -> Result<(), String>;

    /// Install the dependencies declared in `manifest` into the skill's
    /// environment.
    async fn install_requirements(
        &self,
        skill_dir: &Path,
        manifest: &Path,
        timeout: Duration,
    ) -> Result<(), String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Virtualenv backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct VenvSandbox {
    /// Base interpreter used for `-m venv`.
    python: String,
    provision_timeout: Duration,
}

impl VenvSandbox {
    pub fn new(python: impl Into<String>, provision_timeout: Duration) -> Self {
        Self {
            python: python.into(),
            provision_timeout,
        }
    }
}

#[async_trait::async_trait]
impl SandboxProvider for VenvSandbox {
    fn find_interpreter(&self, skill_dir: &Path) -> Option<PathBuf> {
        let venv = skill_dir.join(VENV_DIR);
        [
            venv.join("bin").join("python"),
            venv.join("Scripts").join("python.exe"),
        ]
        .into_iter()
        .find(|p| p.exists())
    }

    async fn execute(
        &self,
        interpreter: &Path,
        script: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> ScriptExecutionResult {
        run_process(
            interpreter.as_os_str(),
            &[OsStr::new("-c"), OsStr::new(script)],
            cwd,
            timeout,
        )
        .await
    }

    async fn provision(&self, skill_dir: &Path) -> Result<(), String> {
        tracing::info!(skill_dir = %skill_dir.display(), python = %self.python, "creating venv");
        let result = run_process(
            OsStr::new(&self.python),
            &[OsStr::new("-m"), OsStr::new("venv"), OsStr::new(VENV_DIR)],
            skill_dir,
            self.provision_timeout,
        )
        .await;
        check_step("venv creation", &result)
    }

    async fn install_requirements(
        &self,
        skill_dir: &Path,
        manifest: &Path,
        timeout: Duration,
    ) -> Result<(), String> {
        let python = self
            .find_interpreter(skill_dir)
            .ok_or_else(|| format!("no venv interpreter in '{}'", skill_dir.display()))?;
        tracing::info!(manifest = %manifest.display(), "installing skill requirements");
        let result = run_process(
            python.as_os_str(),
            &[
                OsStr::new("-m"),
                OsStr::new("pip"),
                OsStr::new("install"),
                OsStr::new("-r"),
                manifest.as_os_str(),
            ],
            skill_dir,
            timeout,
        )
        .await;
        check_step("dependency installation", &result)
    }
}

fn check_step(step: &str, result: &ScriptExecutionResult) -> Result<(), String> {
    if let Some(err) = &result.error {
        return Err(format!("{step} failed: {err}"));
    }
    if result.returncode != 0 {
        return Err(format!(
            "{step} failed (exit {}): {}",
            result.returncode,
            result.stderr.trim()
        ));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Child-process monitor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn `program args..` in `cwd`, capture both streams and enforce a
/// wall-clock timeout.
///
/// On timeout the child is killed and whatever it printed so far is kept.
/// A spawn failure yields `returncode = -1` with empty output.
pub async fn run_process(
    program: &OsStr,
    args: &[&OsStr],
    cwd: &Path,
    timeout: Duration,
) -> ScriptExecutionResult {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(program = ?program, error = %e, "failed to spawn");
            return ScriptExecutionResult::launch_failure(format!("Error executing script: {e}"));
        }
    };

    let out_buf = Arc::new(Mutex::new(Vec::new()));
    let err_buf = Arc::new(Mutex::new(Vec::new()));
    let mut out_task = tokio::spawn(drain(child.stdout.take(), out_buf.clone()));
    let mut err_task = tokio::spawn(drain(child.stderr.take(), err_buf.clone()));

    let mut result = ScriptExecutionResult::default();

    // The deadline covers the pipes too: a backgrounded grandchild can keep
    // them open long after the direct child exits.
    let deadline = tokio::time::Instant::now() + timeout;
    let finished = tokio::time::timeout_at(deadline, async {
        let status = child.wait().await;
        let _ = tokio::join!(&mut out_task, &mut err_task);
        status
    })
    .await;

    match finished {
        Ok(Ok(exit)) => result.returncode = exit.code().unwrap_or(-1),
        Ok(Err(e)) => {
            result.returncode = -1;
            result.error = Some(format!("Error executing script: {e}"));
        }
        Err(_) => {
            let _ = child.kill().await;
            let drained = tokio::time::timeout(DRAIN_GRACE, async {
                let _ = tokio::join!(&mut out_task, &mut err_task);
            })
            .await;
            if drained.is_err() {
                out_task.abort();
                err_task.abort();
            }
            tracing::warn!(timeout_secs = timeout.as_secs_f64(), "script timed out");
            result.returncode = -1;
            result.timed_out = true;
            result.error = Some(format!(
                "Script execution exceeded timeout of {} seconds",
                fmt_secs(timeout)
            ));
        }
    }

    result.stdout = String::from_utf8_lossy(&out_buf.lock()).into_owned();
    result.stderr = String::from_utf8_lossy(&err_buf.lock()).into_owned();
    result
}

async fn drain<R>(pipe: Option<R>, buf: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.lock().extend_from_slice(&chunk[..n]),
        }
    }
}

fn fmt_secs(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{}", d.as_secs_f64())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
