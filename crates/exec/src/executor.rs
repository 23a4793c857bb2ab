use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use execd_core::{constants::TERMINATION_GRACE_PERIOD, Error, StepOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// One command's input: what to run, where, with what environment and
/// stdin, and how long it's allowed to run.
pub struct StepRequest<'a> {
    pub cmd: &'a str,
    pub cwd: &'a Path,
    pub env: &'a BTreeMap<String, String>,
    pub stdin: &'a str,
    pub timeout: Duration,
    pub required: bool,
}

/// Spawns a single shell command and enforces its wall timeout.
///
/// Implementations run the command through `sh -c` so that redirections,
/// quoting, and pipes inside `cmd` behave the way a shell user expects.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, request: StepRequest<'_>) -> Result<StepOutcome, Error>;
}

/// Production executor: spawns real child processes via `tokio::process`.
///
/// Unlike a synchronous `std::process::Command::output()` call, this needs
/// to race the child's exit against a deadline, so it can't just block —
/// every await point here is a real suspension point at the async runtime
/// level, matching the "no blocking point at the server level" concurrency
/// requirement.
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        SystemCommandExecutor
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// The timeout state machine driving one spawned command to completion.
enum Phase {
    Exited,
    TimedOut,
}

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, request: StepRequest<'_>) -> Result<StepOutcome, Error> {
        let mut child = Command::new(execd_core::constants::COMMAND_SHELL)
            .arg("-c")
            .arg(request.cmd)
            .current_dir(request.cwd)
            .envs(request.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::spawn_failed(request.cmd, e.to_string()))?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let stdin_data = request.stdin.to_string();
        let stdin_write = tokio::spawn(async move {
            let _ = stdin.write_all(stdin_data.as_bytes()).await;
            // Dropping `stdin` here closes the child's input, signalling EOF.
        });

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let start = Instant::now();
        let (phase, exit_code) = drive_to_completion(&mut child, request.timeout).await?;

        let _ = stdin_write.await;
        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let duration = start.elapsed().as_secs_f64();

        Ok(StepOutcome {
            cmd: request.cmd.to_string(),
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            exit_code,
            duration,
            timed_out: matches!(phase, Phase::TimedOut),
            required: request.required,
        })
    }
}

/// `SPAWNED -> EXITED` on natural completion within the deadline;
/// `SPAWNED -> TERMINATING -> KILLING -> EXITED(timed_out=true)` once the
/// deadline expires: send SIGTERM, wait one grace period, then SIGKILL.
async fn drive_to_completion(
    child: &mut tokio::process::Child,
    timeout: Duration,
) -> Result<(Phase, i32), Error> {
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => Ok((Phase::Exited, status.code().unwrap_or(-1))),
        Ok(Err(e)) => Err(Error::spawn_failed("sh", format!("failed to await child: {e}"))),
        Err(_elapsed) => {
            terminate(child).await?;
            Ok((Phase::TimedOut, -1))
        }
    }
}

async fn terminate(child: &mut tokio::process::Child) -> Result<(), Error> {
    if let Some(pid) = child.id() {
        let nix_pid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGTERM);
    }

    if tokio::time::timeout(TERMINATION_GRACE_PERIOD, child.wait())
        .await
        .is_ok()
    {
        return Ok(());
    }

    // Grace period elapsed without the child exiting: escalate to SIGKILL.
    let _ = child.kill().await;
    let _ = child.wait().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn runs_a_command_and_captures_stdout() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let outcome = executor
            .run(StepRequest {
                cmd: "echo hi",
                cwd: dir.path(),
                env: &env(),
                stdin: "",
                timeout: Duration::from_secs(5),
                required: false,
            })
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "hi\n");
        assert_eq!(outcome.exit_code, 0);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn enforces_timeout() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let outcome = executor
            .run(StepRequest {
                cmd: "sleep 2",
                cwd: dir.path(),
                env: &env(),
                stdin: "",
                timeout: Duration::from_millis(200),
                required: false,
            })
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, -1);
        assert!(outcome.duration < 1.0);
    }

    #[tokio::test]
    async fn delivers_stdin() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let outcome = executor
            .run(StepRequest {
                cmd: "cat",
                cwd: dir.path(),
                env: &env(),
                stdin: "hello\n",
                timeout: Duration::from_secs(5),
                required: false,
            })
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "hello\n");
    }
}
