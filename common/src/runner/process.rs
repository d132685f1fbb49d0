// Child process execution for a single step: spawn, stream output through
// the redactor, and wait bounded by the run deadline.

use crate::errors::ExecutionError;
use crate::secrets::SecretStore;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

/// A step with its environment already resolved against the secret store.
/// No Debug impl: the resolved env carries raw secret values.
#[derive(Clone)]
pub struct ResolvedStep {
    pub id: String,
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    /// Exact values for the child environment, secrets included
    pub env: Vec<(String, String)>,
}

/// Run one step to completion or until the deadline.
///
/// The child inherits the parent environment with the resolved entries
/// overlaid, so injected values reach the process exactly as provided.
/// Stdout and stderr are logged line by line after redaction. On deadline
/// expiry the child is killed and the whole run reports a timeout.
pub async fn run_step(
    step: &ResolvedStep,
    deadline: Instant,
    timeout_seconds: u64,
    secrets: &Arc<SecretStore>,
) -> Result<i32, ExecutionError> {
    let mut command = Command::new(&step.program);
    command
        .args(&step.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &step.working_dir {
        command.current_dir(dir);
    }
    for (key, value) in &step.env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| ExecutionError::SpawnFailed {
        step: step.id.clone(),
        reason: e.to_string(),
    })?;

    let stdout_task = child
        .stdout
        .take()
        .map(|out| spawn_line_logger(out, step.id.clone(), false, Arc::clone(secrets)));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| spawn_line_logger(err, step.id.clone(), true, Arc::clone(secrets)));

    let wait_result = timeout_at(deadline, child.wait()).await;

    let outcome = match wait_result {
        Err(_) => {
            // Kill before draining the readers; the pipes only close once
            // the child is gone.
            warn!(step = %step.id, timeout_seconds, "Deadline reached, killing step");
            if let Err(e) = child.kill().await {
                warn!(step = %step.id, error = %e, "Failed to kill timed out step");
            }
            Err(ExecutionError::Timeout(timeout_seconds))
        }
        Ok(Err(e)) => Err(ExecutionError::SpawnFailed {
            step: step.id.clone(),
            reason: format!("failed to wait for child: {}", e),
        }),
        Ok(Ok(status)) => Ok(status),
    };

    // Flush whatever output the readers collected before returning
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let status = outcome?;

    match status.code() {
        Some(0) => Ok(0),
        Some(code) => Err(ExecutionError::NonZeroExit {
            step: step.id.clone(),
            code,
        }),
        None => Err(ExecutionError::KilledBySignal {
            step: step.id.clone(),
        }),
    }
}

fn spawn_line_logger<R>(
    reader: R,
    step_id: String,
    is_stderr: bool,
    secrets: Arc<SecretStore>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = secrets.redact(&line);
                    if is_stderr {
                        warn!(step = %step_id, "{}", line);
                    } else {
                        info!(step = %step_id, "{}", line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(step = %step_id, error = %e, "Failed to read step output");
                    break;
                }
            }
        }
    })
}
