//! Background server lifecycle
//!
//! The server under test is spawned in the background with its output
//! captured to the run's log file; the runner proceeds to the readiness
//! gate while it boots. Teardown stops it with TERM first, then kill.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::PipelineError;

const STOP_GRACE: Duration = Duration::from_secs(10);

/// Handle to the spawned server process
#[derive(Debug)]
pub struct ServiceHandle {
    child: Child,
    program: String,
    log_path: PathBuf,
}

impl ServiceHandle {
    /// Spawn the server in the background, non-blocking.
    ///
    /// stdout and stderr both land in `log_path`; `kill_on_drop` guarantees
    /// the child dies with the runner even on abnormal exit paths.
    pub fn spawn(
        program: &str,
        args: &[String],
        env: &[(String, String)],
        log_path: &Path,
    ) -> Result<Self, PipelineError> {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let log = std::fs::File::create(log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| {
            PipelineError::setup("service", format!("failed to spawn '{program}': {e}"))
        })?;

        info!(
            program = %program,
            pid = ?child.id(),
            log_file = %log_path.display(),
            "Server started in background"
        );

        Ok(Self {
            child,
            program: program.to_string(),
            log_path: log_path.to_path_buf(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Exit status if the server already died, without blocking.
    ///
    /// A server that exits before readiness is a bring-up failure the
    /// readiness gate reports immediately instead of polling out the clock.
    pub fn early_exit(&mut self) -> Result<Option<i32>, PipelineError> {
        match self.child.try_wait() {
            Ok(Some(status)) => Ok(Some(status.code().unwrap_or(-1))),
            Ok(None) => Ok(None),
            Err(e) => Err(PipelineError::setup(
                "service",
                format!("failed to poll server status: {e}"),
            )),
        }
    }

    /// Stop the server: TERM, a short grace wait, then kill.
    pub async fn stop(mut self) -> Result<(), PipelineError> {
        if let Ok(Some(status)) = self.child.try_wait() {
            info!(program = %self.program, status = ?status.code(), "Server already exited");
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            let _ = std::process::Command::new("kill")
                .arg("-TERM")
                .arg(pid.to_string())
                .output();
        }

        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(program = %self.program, status = ?status.code(), "Server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(PipelineError::teardown(format!(
                "failed waiting for server to stop: {e}"
            ))),
            Err(_) => {
                warn!(program = %self.program, "Server ignored TERM, killing");
                self.child
                    .kill()
                    .await
                    .map_err(|e| PipelineError::teardown(format!("failed to kill server: {e}")))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_captures_output_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");

        let handle = ServiceHandle::spawn(
            "sh",
            &["-c".to_string(), "echo booting".to_string()],
            &[],
            &log_path,
        )
        .unwrap();

        // Give the child a moment to run and flush
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop().await.unwrap();

        let captured = std::fs::read_to_string(&log_path).unwrap();
        assert!(captured.contains("booting"));
    }

    #[tokio::test]
    async fn early_exit_reports_dead_server() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");

        let mut handle =
            ServiceHandle::spawn("sh", &["-c".to_string(), "exit 3".to_string()], &[], &log_path)
                .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.early_exit().unwrap(), Some(3));
    }

    #[tokio::test]
    async fn stop_terminates_long_running_server() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");

        let handle = ServiceHandle::spawn(
            "sh",
            &["-c".to_string(), "sleep 30".to_string()],
            &[],
            &log_path,
        )
        .unwrap();

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_missing_program_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("server.log");

        let err =
            ServiceHandle::spawn("kindling-no-such-server", &[], &[], &log_path).unwrap_err();
        assert!(matches!(err, PipelineError::Setup { .. }));
    }
}
