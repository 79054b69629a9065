//! Environment diagnostics
//!
//! Probes everything a run depends on before anything is provisioned: the
//! required CLIs, the container runtime behind kind, the configuration
//! file, and the workspace layout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::config;
use crate::exec::{CommandExecutor, CommandSpec, ProcessCommandExecutor};
use crate::toolchain::{self, ToolStatus, REQUIRED_TOOLS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiagnosticStatus {
    Pass,
    Warning,
    Fail,
}

struct DiagnosticResult {
    name: String,
    status: DiagnosticStatus,
    message: String,
}

impl DiagnosticResult {
    fn icon(&self) -> &'static str {
        match self.status {
            DiagnosticStatus::Pass => "✅",
            DiagnosticStatus::Warning => "⚠️",
            DiagnosticStatus::Fail => "❌",
        }
    }
}

pub async fn doctor_command(verbose: bool) -> Result<u8> {
    println!("🩺 kindling doctor");
    println!();

    let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessCommandExecutor);
    let mut results = Vec::new();

    check_toolchain(&executor, verbose, &mut results).await;
    check_container_runtime(&executor, &mut results).await;
    check_configuration(&mut results);
    check_workspace(&mut results);

    for result in &results {
        println!("  {} {}: {}", result.icon(), result.name, result.message);
    }

    let fails = results
        .iter()
        .filter(|r| r.status == DiagnosticStatus::Fail)
        .count();
    let warnings = results
        .iter()
        .filter(|r| r.status == DiagnosticStatus::Warning)
        .count();

    println!();
    if fails > 0 {
        println!("❌ {fails} check(s) failed, {warnings} warning(s)");
        println!("   Fix the failures above before running 'kindling run'");
        Ok(1)
    } else if warnings > 0 {
        println!("⚠️  All checks passed with {warnings} warning(s)");
        Ok(0)
    } else {
        println!("✅ Environment ready");
        Ok(0)
    }
}

async fn check_toolchain(
    executor: &Arc<dyn CommandExecutor>,
    verbose: bool,
    results: &mut Vec<DiagnosticResult>,
) {
    for tool in REQUIRED_TOOLS {
        let report = toolchain::probe_tool(executor, tool).await;
        let result = match report.status {
            ToolStatus::Present { version } => DiagnosticResult {
                name: format!("tool: {}", report.name),
                status: DiagnosticStatus::Pass,
                message: if verbose && !version.is_empty() {
                    version
                } else {
                    "installed".to_string()
                },
            },
            ToolStatus::Missing => DiagnosticResult {
                name: format!("tool: {}", report.name),
                status: DiagnosticStatus::Fail,
                message: "not installed".to_string(),
            },
            ToolStatus::Broken { detail } => DiagnosticResult {
                name: format!("tool: {}", report.name),
                status: DiagnosticStatus::Fail,
                message: format!("probe failed: {detail}"),
            },
        };
        results.push(result);
    }
}

async fn check_container_runtime(
    executor: &Arc<dyn CommandExecutor>,
    results: &mut Vec<DiagnosticResult>,
) {
    // kind needs a running container runtime underneath
    let spec = CommandSpec::new("docker")
        .arg("info")
        .timeout(Duration::from_secs(30));
    let result = match executor.execute(spec).await {
        Ok(output) if output.success() => DiagnosticResult {
            name: "container runtime".to_string(),
            status: DiagnosticStatus::Pass,
            message: "docker daemon reachable".to_string(),
        },
        Ok(output) => DiagnosticResult {
            name: "container runtime".to_string(),
            status: DiagnosticStatus::Fail,
            message: format!("docker daemon not reachable: {}", output.failure_detail()),
        },
        Err(_) => DiagnosticResult {
            name: "container runtime".to_string(),
            status: DiagnosticStatus::Fail,
            message: "docker CLI not installed".to_string(),
        },
    };
    results.push(result);
}

fn check_configuration(results: &mut Vec<DiagnosticResult>) {
    if Path::new("kindling.toml").exists() {
        results.push(DiagnosticResult {
            name: "configuration".to_string(),
            status: DiagnosticStatus::Pass,
            message: "kindling.toml found".to_string(),
        });
    } else {
        results.push(DiagnosticResult {
            name: "configuration".to_string(),
            status: DiagnosticStatus::Warning,
            message: "no kindling.toml, using defaults and KINDLING_* env vars".to_string(),
        });
    }

    match std::env::var("KINDLING_API_URL") {
        Ok(url) if !url.is_empty() => results.push(DiagnosticResult {
            name: "api url".to_string(),
            status: DiagnosticStatus::Pass,
            message: url,
        }),
        _ => match config() {
            Ok(cfg) => results.push(DiagnosticResult {
                name: "api url".to_string(),
                status: DiagnosticStatus::Pass,
                message: format!("{} (from configuration)", cfg.server.api_url),
            }),
            Err(e) => results.push(DiagnosticResult {
                name: "api url".to_string(),
                status: DiagnosticStatus::Fail,
                message: format!("configuration failed to load: {e}"),
            }),
        },
    }
}

fn check_workspace(results: &mut Vec<DiagnosticResult>) {
    let Ok(cfg) = config() else {
        results.push(DiagnosticResult {
            name: "workspace".to_string(),
            status: DiagnosticStatus::Fail,
            message: "configuration failed to load".to_string(),
        });
        return;
    };

    match crate::workspace::inspect(
        Path::new(&cfg.workspace.root),
        Path::new(&cfg.tests.working_dir),
    ) {
        Ok(info) => {
            let revision = info
                .revision
                .map(|r| format!("revision {}", &r[..12.min(r.len())]))
                .unwrap_or_else(|| "not a git repository".to_string());
            results.push(DiagnosticResult {
                name: "workspace".to_string(),
                status: DiagnosticStatus::Pass,
                message: format!("{} ({revision})", info.root.display()),
            });
        }
        Err(e) => results.push(DiagnosticResult {
            name: "workspace".to_string(),
            status: DiagnosticStatus::Fail,
            message: e.to_string(),
        }),
    }
}
