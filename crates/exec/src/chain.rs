use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use execd_core::{CommandStep, Commands, Error, StepOutcome};

use crate::executor::{CommandExecutor, StepRequest};

/// The roll-up of running a `Commands` value (single command or chain)
/// against one workspace.
pub struct ChainResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: f64,
    pub timed_out: bool,
    /// `Some` only when `Commands::Chain` was given, even if empty.
    pub commands: Option<Vec<StepOutcome>>,
}

pub struct ChainRunner;

impl ChainRunner {
    /// Runs `commands` in `cwd` with the given base `env` and `stdin`,
    /// falling back to `default_timeout` for any step that doesn't specify
    /// its own.
    pub async fn run(
        executor: &dyn CommandExecutor,
        commands: &Commands,
        cwd: &Path,
        env: &BTreeMap<String, String>,
        stdin: &str,
        default_timeout: Duration,
        continue_on_error: bool,
    ) -> Result<ChainResult, Error> {
        match commands {
            Commands::Single(cmd) => {
                let step = CommandStep {
                    cmd: cmd.clone(),
                    timeout: None,
                    required: false,
                };
                let outcome = run_step(executor, &step, cwd, env, stdin, default_timeout).await?;
                Ok(ChainResult {
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                    exit_code: outcome.exit_code,
                    duration: outcome.duration,
                    timed_out: outcome.timed_out,
                    commands: None,
                })
            }
            Commands::Chain(steps) => run_chain(
                executor,
                steps,
                cwd,
                env,
                stdin,
                default_timeout,
                continue_on_error,
            )
            .await,
        }
    }
}

async fn run_chain(
    executor: &dyn CommandExecutor,
    steps: &[CommandStep],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    stdin: &str,
    default_timeout: Duration,
    continue_on_error: bool,
) -> Result<ChainResult, Error> {
    let mut executed = Vec::new();
    let mut prior_non_required_failed = false;
    let mut last_exit_code = 0;
    let mut any_timed_out = false;
    let mut total_duration = 0.0;

    for step in steps {
        let should_run = !prior_non_required_failed || step.required || continue_on_error;
        if !should_run {
            continue;
        }

        let outcome = run_step(executor, step, cwd, env, stdin, default_timeout).await?;
        total_duration += outcome.duration;
        last_exit_code = outcome.exit_code;
        any_timed_out |= outcome.timed_out;
        if outcome.exit_code != 0 && !outcome.required {
            prior_non_required_failed = true;
        }
        executed.push(outcome);
    }

    let (stdout, stderr) = match executed.last() {
        Some(last) => (last.stdout.clone(), last.stderr.clone()),
        None => (String::new(), String::new()),
    };

    Ok(ChainResult {
        stdout,
        stderr,
        exit_code: if executed.is_empty() { 0 } else { last_exit_code },
        duration: total_duration,
        timed_out: any_timed_out,
        commands: Some(executed),
    })
}

async fn run_step(
    executor: &dyn CommandExecutor,
    step: &CommandStep,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    stdin: &str,
    default_timeout: Duration,
) -> Result<StepOutcome, Error> {
    let timeout = step
        .timeout
        .map(Duration::from_secs_f64)
        .unwrap_or(default_timeout);

    executor
        .run(StepRequest {
            cmd: &step.cmd,
            cwd,
            env,
            stdin,
            timeout,
            required: step.required,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SystemCommandExecutor;

    fn env() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn empty_chain_succeeds() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let result = ChainRunner::run(
            &executor,
            &Commands::Chain(vec![]),
            dir.path(),
            &env(),
            "",
            Duration::from_secs(5),
            false,
        )
        .await
        .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.commands.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn required_step_runs_after_failure_and_wins_exit_code() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let steps = vec![
            CommandStep { cmd: "exit 0".into(), timeout: None, required: false },
            CommandStep { cmd: "exit 1".into(), timeout: None, required: false },
            CommandStep { cmd: "echo ran".into(), timeout: None, required: true },
        ];
        let result = ChainRunner::run(
            &executor,
            &Commands::Chain(steps),
            dir.path(),
            &env(),
            "",
            Duration::from_secs(5),
            false,
        )
        .await
        .unwrap();
        let commands = result.commands.unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[1].exit_code, 1);
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn non_required_step_is_skipped_after_failure() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let steps = vec![
            CommandStep { cmd: "exit 1".into(), timeout: None, required: false },
            CommandStep { cmd: "echo skipped".into(), timeout: None, required: false },
        ];
        let result = ChainRunner::run(
            &executor,
            &Commands::Chain(steps),
            dir.path(),
            &env(),
            "",
            Duration::from_secs(5),
            false,
        )
        .await
        .unwrap();
        assert_eq!(result.commands.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn continue_on_error_runs_every_step() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let steps = vec![
            CommandStep { cmd: "exit 1".into(), timeout: None, required: false },
            CommandStep { cmd: "echo ran".into(), timeout: None, required: false },
        ];
        let result = ChainRunner::run(
            &executor,
            &Commands::Chain(steps),
            dir.path(),
            &env(),
            "",
            Duration::from_secs(5),
            true,
        )
        .await
        .unwrap();
        assert_eq!(result.commands.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_required_step_still_runs_after_a_required_step_fails() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let steps = vec![
            CommandStep { cmd: "exit 1".into(), timeout: None, required: true },
            CommandStep { cmd: "echo ran".into(), timeout: None, required: false },
        ];
        let result = ChainRunner::run(
            &executor,
            &Commands::Chain(steps),
            dir.path(),
            &env(),
            "",
            Duration::from_secs(5),
            false,
        )
        .await
        .unwrap();
        assert_eq!(result.commands.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn timed_out_is_the_or_across_every_executed_step() {
        let executor = SystemCommandExecutor::new();
        let dir = tempfile::TempDir::new().unwrap();
        let steps = vec![
            CommandStep { cmd: "echo fast".into(), timeout: None, required: false },
            CommandStep { cmd: "sleep 5".into(), timeout: Some(0.1), required: false },
            CommandStep { cmd: "echo required".into(), timeout: None, required: true },
        ];
        let result = ChainRunner::run(
            &executor,
            &Commands::Chain(steps),
            dir.path(),
            &env(),
            "",
            Duration::from_secs(5),
            false,
        )
        .await
        .unwrap();
        let commands = result.commands.unwrap();
        assert!(commands[1].timed_out);
        assert!(!commands[2].timed_out);
        assert!(result.timed_out);
    }
}
