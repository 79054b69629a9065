//! External CLI verification
//!
//! The pipeline shells out to a package/environment manager, the cluster
//! provider CLI, the Kubernetes CLI, its plugin manager, and the
//! pod-eviction plugin. Each is probed before the cluster is created so a
//! missing tool fails the run as a setup error instead of mid-pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::exec::{CommandError, CommandExecutor, CommandSpec};

/// A required external tool and the probe proving it works
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: &'static str,
    pub program: &'static str,
    pub args: &'static [&'static str],
}

/// Tools the pipeline cannot run without
pub const REQUIRED_TOOLS: &[Tool] = &[
    Tool {
        name: "uv",
        program: "uv",
        args: &["--version"],
    },
    Tool {
        name: "kind",
        program: "kind",
        args: &["--version"],
    },
    Tool {
        name: "kubectl",
        program: "kubectl",
        args: &["version", "--client"],
    },
    Tool {
        name: "krew",
        program: "kubectl",
        args: &["krew", "version"],
    },
    Tool {
        name: "kubectl-evict",
        program: "kubectl",
        args: &["evict", "--help"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToolStatus {
    Present { version: String },
    Missing,
    Broken { detail: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub name: String,
    pub status: ToolStatus,
}

impl ToolReport {
    pub fn ok(&self) -> bool {
        matches!(self.status, ToolStatus::Present { .. })
    }
}

/// Probe one tool and classify the result
pub async fn probe_tool(executor: &Arc<dyn CommandExecutor>, tool: &Tool) -> ToolReport {
    let spec = CommandSpec::new(tool.program)
        .args(tool.args.iter().copied())
        .timeout(Duration::from_secs(30));

    let status = match executor.execute(spec).await {
        Ok(output) if output.success() => {
            let version = output
                .stdout
                .lines()
                .chain(output.stderr.lines())
                .find(|line| !line.trim().is_empty())
                .unwrap_or("")
                .trim()
                .to_string();
            debug!(tool = tool.name, version = %version, "Tool present");
            ToolStatus::Present { version }
        }
        Ok(output) => {
            warn!(tool = tool.name, detail = %output.failure_detail(), "Tool probe failed");
            ToolStatus::Broken {
                detail: output.failure_detail(),
            }
        }
        Err(CommandError::CommandNotFound { .. }) => {
            warn!(tool = tool.name, "Tool not installed");
            ToolStatus::Missing
        }
        Err(e) => {
            warn!(tool = tool.name, error = %e, "Tool probe errored");
            ToolStatus::Broken {
                detail: e.to_string(),
            }
        }
    };

    ToolReport {
        name: tool.name.to_string(),
        status,
    }
}

/// Probe every required tool; any missing or broken one is a setup failure
pub async fn verify_toolchain(
    executor: &Arc<dyn CommandExecutor>,
) -> Result<Vec<ToolReport>, PipelineError> {
    let mut reports = Vec::with_capacity(REQUIRED_TOOLS.len());
    for tool in REQUIRED_TOOLS {
        reports.push(probe_tool(executor, tool).await);
    }

    let unusable: Vec<&ToolReport> = reports.iter().filter(|r| !r.ok()).collect();
    if !unusable.is_empty() {
        let names: Vec<&str> = unusable.iter().map(|r| r.name.as_str()).collect();
        return Err(PipelineError::setup(
            "toolchain",
            format!("required tools unavailable: {}", names.join(", ")),
        ));
    }

    Ok(reports)
}
