//! Base command execution abstraction
//!
//! Provides the foundational trait for executing external commands, enabling
//! dependency injection for testing. Every shell-out in the crate (cluster
//! provider, toolchain probes, test runner) goes through this seam.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// A fully-described external command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// "program arg1 arg2" rendering for logs and mock lookup keys.
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    /// Whichever stream carries the failure detail, trimmed for messages.
    pub fn failure_detail(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        detail.to_string()
    }
}

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
///
/// This abstraction allows the rest of the codebase to execute commands
/// without directly depending on tokio::process::Command, enabling testing
/// with scripted implementations.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Real implementation on tokio::process.
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec.display_line(), "Executing external command");

        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| CommandError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => command.output().await,
        }
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::CommandNotFound {
                    command: spec.program.clone(),
                }
            } else {
                CommandError::Io {
                    message: e.to_string(),
                }
            }
        })?;

        Ok(CommandOutput {
            status_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Simple scripted mock for testing
    struct MockCommandExecutor {
        responses: HashMap<String, Result<CommandOutput, CommandError>>,
    }

    impl MockCommandExecutor {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
            }
        }

        fn expect_command(
            mut self,
            line: &str,
            response: Result<CommandOutput, CommandError>,
        ) -> Self {
            self.responses.insert(line.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
            self.responses
                .get(&spec.display_line())
                .cloned()
                .unwrap_or(Err(CommandError::CommandNotFound {
                    command: spec.program,
                }))
        }
    }

    #[tokio::test]
    async fn test_process_command_executor_success() {
        let executor = ProcessCommandExecutor;
        let result = executor.execute(CommandSpec::new("echo").arg("hello")).await;

        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_process_command_executor_command_not_found() {
        let executor = ProcessCommandExecutor;
        let result = executor
            .execute(CommandSpec::new("nonexistent_command_xyz"))
            .await;

        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            CommandError::CommandNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_process_command_executor_timeout() {
        let executor = ProcessCommandExecutor;
        let result = executor
            .execute(
                CommandSpec::new("sleep")
                    .arg("5")
                    .timeout(Duration::from_millis(50)),
            )
            .await;

        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_process_command_executor_captures_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ProcessCommandExecutor;
        let result = executor
            .execute(CommandSpec::new("pwd").cwd(dir.path()))
            .await
            .unwrap();

        assert!(result.success());
        assert!(result.stdout.trim().ends_with(
            dir.path()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
        ));
    }

    #[tokio::test]
    async fn test_mock_command_executor() {
        let mock = MockCommandExecutor::new().expect_command(
            "echo hello",
            Ok(CommandOutput {
                status_code: 0,
                stdout: "hello\n".to_string(),
                stderr: String::new(),
            }),
        );

        let result = mock.execute(CommandSpec::new("echo").arg("hello")).await;
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello\n");
    }

    #[test]
    fn test_failure_detail_prefers_stderr() {
        let output = CommandOutput {
            status_code: 1,
            stdout: "partial progress\n".to_string(),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(output.failure_detail(), "boom");

        let quiet = CommandOutput {
            status_code: 1,
            stdout: "only stdout\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(quiet.failure_detail(), "only stdout");
    }
}
