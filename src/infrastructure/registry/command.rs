//! External registry command execution.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{LookupError, LookupErrorKind};

/// Captured result of one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs a registry client program and captures its output.
///
/// A non-zero exit is not an error at this level; the protocol client decides
/// what the exit code means.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, LookupError>;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommand {
    timeout: Duration,
}

impl SystemCommand {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommand {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, LookupError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LookupError::new(
                    LookupErrorKind::CommandFailed,
                    format!("failed to start {program}: {e}"),
                )
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                LookupError::new(
                    LookupErrorKind::CommandTimeout,
                    format!("{program} did not finish within {:?}", self.timeout),
                )
            })?
            .map_err(|e| LookupError::new(LookupErrorKind::CommandFailed, e.to_string()))?;

        Ok(CommandOutput {
            // Killed by a signal
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_exit_code_and_output() {
        let runner = SystemCommand::new(Duration::from_secs(5));
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];

        let output = runner.run("sh", &args).await.unwrap();

        assert_eq!(output.code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_command_failed() {
        let runner = SystemCommand::new(Duration::from_secs(5));

        let err = runner
            .run("bulkdns-no-such-program", &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind, LookupErrorKind::CommandFailed);
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = SystemCommand::new(Duration::from_millis(50));
        let args = vec!["5".to_string()];

        let err = runner.run("sleep", &args).await.unwrap_err();

        assert_eq!(err.kind, LookupErrorKind::CommandTimeout);
    }
}
