//! Pipeline-level error taxonomy
//!
//! Library code returns these through `Result`; the CLI boundary maps them
//! to exit codes and human-readable output.

use thiserror::Error;

use crate::exec::CommandError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Toolchain, workspace, or cluster provisioning failure before tests ran.
    #[error("setup failed during {stage}: {detail}")]
    Setup { stage: String, detail: String },

    /// The server never answered its health endpoint within the budget.
    #[error("server not ready within {budget_secs}s ({attempts} probe attempts)")]
    ReadinessTimeout { budget_secs: u64, attempts: u64 },

    /// The integration suite ran and reported failures.
    #[error("integration suite failed with exit code {exit_code}")]
    TestsFailed { exit_code: i32 },

    /// Best-effort cleanup failed. Never retried, never overrides the
    /// verdict of the steps that ran before it.
    #[error("teardown failed: {detail}")]
    Teardown { detail: String },

    /// The overall job budget was exhausted mid-step.
    #[error("job deadline of {budget_secs}s exhausted")]
    Deadline { budget_secs: u64 },

    /// SIGINT/SIGTERM arrived while a step was in flight.
    #[error("run interrupted by signal")]
    Interrupted,

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn setup(stage: &str, detail: impl Into<String>) -> Self {
        Self::Setup {
            stage: stage.to_string(),
            detail: detail.into(),
        }
    }

    pub fn teardown(detail: impl Into<String>) -> Self {
        Self::Teardown {
            detail: detail.into(),
        }
    }

    /// Exit code carried by the failed test suite, if this is that failure.
    pub fn test_exit_code(&self) -> Option<i32> {
        match self {
            Self::TestsFailed { exit_code } => Some(*exit_code),
            _ => None,
        }
    }
}
