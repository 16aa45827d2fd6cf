//! Local process backend.
//!
//! Runs the engine binary once per call with piped stdout/stderr and a hard
//! timeout. The blocking wait runs on tokio's blocking pool so a slow child
//! never stalls the scheduler driving other requests.

use super::{build_args, QueryBackend};
use crate::config::ExecutionConfig;
use crate::error::{ExecError, Result};
use crate::query::{ExitIndicator, QueryRequest, RawOutput, RequestKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between child status checks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Runs `binary` with `args` and waits up to `timeout` for it to exit and for
/// its output pipes to close.
///
/// Exactly one child process is spawned and reaped. On timeout the child is
/// killed and a `Timeout` error carries whatever stdout was captured. The
/// deadline is checked before every status poll, so a zero timeout always
/// times out.
pub fn run_local(
    binary: &Path,
    args: &[String],
    env: &BTreeMap<String, String>,
    timeout: Duration,
    kind: RequestKind,
) -> Result<RawOutput> {
    debug!("Running {} {:?}", binary.display(), args);

    let deadline = Instant::now() + timeout;
    let mut child = Command::new(binary)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExecError::launch(format!("Failed to launch {}: {e}", binary.display())))?;

    let stdout_buf = SharedBuffer::default();
    let stderr_buf = SharedBuffer::default();
    let stdout_reader = child
        .stdout
        .take()
        .map(|pipe| spawn_reader(pipe, Arc::clone(&stdout_buf)));
    let stderr_reader = child
        .stderr
        .take()
        .map(|pipe| spawn_reader(pipe, Arc::clone(&stderr_buf)));

    let status = loop {
        if Instant::now() >= deadline {
            kill_and_reap(&mut child);
            return Err(timed_out(binary, timeout, &stdout_buf));
        }

        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())))
            }
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(ExecError::internal(format!(
                    "Failed to wait for {}: {e}",
                    binary.display()
                )));
            }
        }
    };

    // Readers finish once every holder of the pipes closes them. Processes
    // the child left behind can keep them open, so the deadline still holds.
    let readers: Vec<JoinHandle<()>> = [stdout_reader, stderr_reader]
        .into_iter()
        .flatten()
        .collect();
    while !readers.iter().all(JoinHandle::is_finished) {
        if Instant::now() >= deadline {
            return Err(timed_out(binary, timeout, &stdout_buf));
        }
        thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }
    for reader in readers {
        let _ = reader.join();
    }

    let stdout = snapshot(&stdout_buf);
    let stderr = snapshot(&stderr_buf);
    debug!(
        "{} exited with {:?} (stdout {} bytes, stderr {} bytes)",
        binary.display(),
        status.code(),
        stdout.len(),
        stderr.len()
    );

    Ok(RawOutput {
        kind,
        stdout,
        stderr,
        exit: ExitIndicator::from_code(status.code()),
        rows_affected: None,
    })
}

fn timed_out(binary: &Path, timeout: Duration, stdout: &SharedBuffer) -> ExecError {
    let partial = snapshot(stdout);
    warn!(
        "{} timed out after {:?} ({} bytes of stdout captured)",
        binary.display(),
        timeout,
        partial.len()
    );
    ExecError::timeout(
        format!("Query timed out after {:.3} seconds", timeout.as_secs_f64()),
        partial,
    )
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, buffer: SharedBuffer) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => match buffer.lock() {
                    Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                    Err(_) => break,
                },
            }
        }
    })
}

fn snapshot(buffer: &SharedBuffer) -> String {
    match buffer.lock() {
        Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
        Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Kill failed (child may have exited): {e}");
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap child process: {e}");
    }
}

/// Backend that spawns the engine binary per call.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryBackend for LocalBackend {
    async fn run(&self, request: &QueryRequest, config: &ExecutionConfig) -> Result<RawOutput> {
        let binary: PathBuf = config.binary_path.clone();
        let args = build_args(&request.text, config);
        let env = config.env_vars.clone();
        let timeout = config.timeout;
        let kind = request.kind;

        tokio::task::spawn_blocking(move || run_local(&binary, &args, &env, timeout, kind))
            .await
            .map_err(|e| ExecError::internal(format!("Local execution task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
