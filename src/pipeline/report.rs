//! Run reporting
//!
//! A `RunReport` is the durable record of one pipeline run: every step's
//! outcome and duration, the overall verdict, and the exit code the process
//! should carry.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    TimedOut,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Exit code of the test runner when this step ran it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Teardown steps never affect the verdict
    pub teardown: bool,
}

impl StepReport {
    pub fn passed(name: &str, duration_ms: u64, teardown: bool) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Passed,
            duration_ms,
            detail: None,
            exit_code: None,
            teardown,
        }
    }

    pub fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            detail: Some("earlier step failed".to_string()),
            exit_code: None,
            teardown: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunVerdict {
    Passed,
    Failed,
    TimedOut,
    Interrupted,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub cluster_name: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub verdict: RunVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_log: Option<String>,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// Process exit code for this run.
    ///
    /// A passed run exits 0. A failed run carries the test runner's own exit
    /// code when the suite is what failed, and 1 otherwise. Teardown results
    /// never change the code.
    pub fn exit_code(&self) -> u8 {
        if self.verdict == RunVerdict::Passed {
            return 0;
        }
        self.steps
            .iter()
            .filter(|s| !s.teardown)
            .find_map(|s| s.exit_code)
            .map(|code| code.clamp(1, 255) as u8)
            .unwrap_or(1)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating report directory for {}", path.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run report to {}", path.display()))?;
        Ok(())
    }

    /// Human summary printed at the end of `kindling run`
    pub fn print_summary(&self) {
        println!();
        println!("📋 Run {} on cluster '{}'", self.run_id, self.cluster_name);
        if let Some(revision) = &self.revision {
            println!("   revision {revision}");
        }
        for step in &self.steps {
            let icon = match step.status {
                StepStatus::Passed => "✅",
                StepStatus::Failed => "❌",
                StepStatus::TimedOut => "⏰",
                StepStatus::Skipped => "⏭️",
            };
            match &step.detail {
                Some(detail) if step.status != StepStatus::Passed => {
                    println!("  {icon} {} ({}ms): {}", step.name, step.duration_ms, detail);
                }
                _ => println!("  {icon} {} ({}ms)", step.name, step.duration_ms),
            }
        }
        if let Some(log) = &self.server_log {
            println!("   server log: {log}");
        }
        let verdict = match self.verdict {
            RunVerdict::Passed => "✅ passed",
            RunVerdict::Failed => "❌ failed",
            RunVerdict::TimedOut => "⏰ timed out",
            RunVerdict::Interrupted => "🛑 interrupted",
        };
        println!("   verdict: {verdict} (exit code {})", self.exit_code());
    }
}

/// Hostname for run metadata, best-effort
pub fn runner_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
