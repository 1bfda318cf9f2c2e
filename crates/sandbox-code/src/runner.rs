use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use sandbox_context::{ExecutionContext, ExecutionMetrics, ResourceLimits};
use sandbox_error::RuntimeError;

use crate::bundle::{InputBundle, WorkerResult, WorkerStatus};
use crate::outcome::CodeExecutionOutcome;
use crate::policy::CodePolicy;

/// Grace period added to the caller's timeout before the parent gives up
/// waiting on the child and force-kills it — gives the worker's own
/// `RLIMIT_CPU` hard cap a chance to fire first (§4.6).
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Internal state machine used only for assertions/tests — control flow
/// already prevents invalid transitions, so this is never exposed to
/// callers (§4.6 Design Note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Spawned,
    InputWritten,
    Completed,
    TimedOut,
    Killed,
}

/// Spawns one `sandbox-code-worker` child per call, writes the input
/// bundle over its stdin, and enforces the wall-clock deadline by force
/// killing the child — process isolation is the primary enforcement
/// mechanism, not a courtesy (§4.6 Design Note "OS-level process
/// isolation ... primary enforcement").
pub struct SandboxRunner {
    worker_path: PathBuf,
    policy: CodePolicy,
    defaults: ResourceLimits,
}

impl SandboxRunner {
    #[must_use]
    pub fn new(worker_path: PathBuf, policy: CodePolicy, defaults: ResourceLimits) -> Self {
        Self { worker_path, policy, defaults }
    }

    pub async fn run(
        &self,
        context: &ExecutionContext,
        code: &str,
        data: Vec<serde_json::Value>,
        variables: HashMap<String, serde_json::Value>,
        allowed_imports: &[String],
    ) -> Result<CodeExecutionOutcome, RuntimeError> {
        self.policy.validate(code)?;

        let mut metrics = ExecutionMetrics::start();
        let timeout_seconds = context.effective_timeout_seconds(&self.defaults);
        let bundle = InputBundle {
            code: code.to_string(),
            data,
            variables,
            allowed_imports: allowed_imports.to_vec(),
            memory_mb: context.effective_memory_mb(&self.defaults),
            timeout_seconds,
            output_kb: context.effective_output_kb(&self.defaults),
        };

        let payload = serde_json::to_vec(&bundle).map_err(|e| RuntimeError::internal(format!("failed to encode input bundle: {e}")))?;

        let mut child = Command::new(&self.worker_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuntimeError::SandboxError { reason: format!("failed to spawn sandbox worker: {e}") })?;

        let mut stdin = child.stdin.take().ok_or_else(|| RuntimeError::internal("worker stdin unavailable"))?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| RuntimeError::SandboxError { reason: format!("failed to write input bundle: {e}") })?;
        drop(stdin);

        // Drain stdout concurrently with the wait so a chatty worker can't
        // deadlock on a full pipe buffer; `child` itself stays owned here
        // (unlike `wait_with_output`, which would consume it) so the
        // timeout branch below can still reach it to kill and reap.
        let mut stdout_pipe = child.stdout.take().ok_or_else(|| RuntimeError::internal("worker stdout unavailable"))?;
        let stdout_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });

        let deadline = Duration::from_secs(timeout_seconds) + KILL_GRACE;
        let wait_result = tokio::time::timeout(deadline, child.wait()).await;

        match wait_result {
            Ok(Ok(_status)) => {}
            Ok(Err(e)) => return Err(RuntimeError::SandboxError { reason: format!("worker process error: {e}") }),
            Err(_) => {
                // Explicit kill, then an awaited reap — the state machine's
                // `REAPED` terminal state is only true once this returns,
                // not merely once the kill signal has been sent (§4.6,
                // testable invariant 6: "no child process ... remains alive
                // after a bounded reap window").
                if let Err(e) = child.start_kill() {
                    tracing::warn!(error = %e, "failed to send kill signal to timed-out sandbox worker");
                }
                let _ = child.wait().await;
                return Err(RuntimeError::Timeout);
            }
        }

        let stdout_bytes = stdout_reader.await.unwrap_or_default();
        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let result_line = stdout.lines().last().unwrap_or_default();
        let worker_result: WorkerResult = serde_json::from_str(result_line)
            .map_err(|e| RuntimeError::SandboxError { reason: format!("worker produced no parseable result: {e}") })?;

        metrics.record_resource_usage(None, Some(worker_result.execution_time_ms));
        metrics.complete()?;

        match worker_result.status {
            WorkerStatus::Success => Ok(CodeExecutionOutcome {
                stdout: worker_result.stdout,
                stderr: worker_result.stderr,
                stdout_truncated: worker_result.stdout_truncated,
                stderr_truncated: worker_result.stderr_truncated,
                variables: worker_result.variables,
                metrics,
            }),
            WorkerStatus::MemoryError => Err(RuntimeError::ResourceLimit { resource: sandbox_error::ResourceClass::Memory }),
            WorkerStatus::Error => Err(RuntimeError::SandboxError {
                reason: worker_result.error_message.unwrap_or_else(|| "sandboxed code raised an exception".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_grace_is_positive() {
        assert!(KILL_GRACE > Duration::ZERO);
    }

    #[test]
    fn sandbox_state_transitions_are_distinct() {
        assert_ne!(SandboxState::Spawned, SandboxState::Completed);
        assert_ne!(SandboxState::TimedOut, SandboxState::Killed);
    }
}
