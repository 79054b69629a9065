//! Full pipeline run command
//!
//! Gate on the trigger, take the per-cluster run lock, compose the step
//! sequence, execute it under the job deadline, and report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::Instrument;

use crate::cli::commands::trigger::parse_event;
use crate::cluster::{ClusterProvider, KindClusterProvider};
use crate::config::config;
use crate::exec::{CommandExecutor, ProcessCommandExecutor};
use crate::pipeline::steps::{
    ClusterCreateStep, ClusterDeleteStep, ReadinessStep, ServiceStartStep, ServiceStopStep,
    TestSuiteStep, ToolchainStep, WorkspaceStep,
};
use crate::pipeline::{PipelineRunner, RunContext};
use crate::readiness::ReadinessProbe;
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry::{create_run_span, generate_run_id};
use crate::trigger::{evaluate, PathFilter};

pub struct RunParams {
    pub cluster_name: Option<String>,
    pub event: String,
    pub branch: Option<String>,
    pub changed_paths: Vec<String>,
    pub paths: Vec<String>,
    pub main_branch: Option<String>,
    pub skip_trigger_check: bool,
    pub report: Option<String>,
    pub dry_run: bool,
}

pub async fn run_command(params: RunParams) -> Result<u8> {
    let cfg = config()?.clone();
    let cluster_name = params
        .cluster_name
        .unwrap_or_else(|| cfg.cluster.name.clone());

    if !params.skip_trigger_check {
        let event = parse_event(&params.event, params.branch, params.changed_paths)?;
        let globs = if params.paths.is_empty() {
            cfg.trigger.paths.clone()
        } else {
            params.paths
        };
        let filter = PathFilter::new(&globs)?;
        let main_branch = params
            .main_branch
            .unwrap_or_else(|| cfg.trigger.main_branch.clone());

        let decision = evaluate(&event, &main_branch, &filter);
        if !decision.should_run() {
            println!("⏭️  SKIP: {}", decision.reason());
            return Ok(2);
        }
        println!("✅ Trigger accepted: {}", decision.reason());
    }

    let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessCommandExecutor);
    let provider: Arc<dyn ClusterProvider> = Arc::new(KindClusterProvider::new(
        executor.clone(),
        cfg.timeouts.command(),
    ));

    let probe = ReadinessProbe::new(
        cfg.server.health_url.clone(),
        cfg.timeouts.readiness_poll_interval(),
        cfg.timeouts.probe_request(),
    )?;

    // The suite and the server both learn where the API lives
    let run_env = vec![("KINDLING_API_URL".to_string(), cfg.server.api_url.clone())];

    let mut runner = PipelineRunner::new(cfg.timeouts.job(), cfg.timeouts.teardown_grace())
        .step(Box::new(WorkspaceStep {
            root: PathBuf::from(&cfg.workspace.root),
            test_dir: PathBuf::from(&cfg.tests.working_dir),
        }))
        .step(Box::new(ToolchainStep {
            executor: executor.clone(),
        }))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(ServiceStartStep {
            command: cfg.server.command.clone(),
            args: cfg.server.args.clone(),
            env: run_env.clone(),
            log_path: PathBuf::from(&cfg.server.log_file),
        }))
        .step(Box::new(ReadinessStep {
            probe,
            budget: cfg.timeouts.readiness(),
        }))
        .step(Box::new(TestSuiteStep {
            executor: executor.clone(),
            command: cfg.tests.command.clone(),
            args: cfg.tests.args.clone(),
            env: run_env,
        }))
        .teardown_step(Box::new(ServiceStopStep))
        .teardown_step(Box::new(ClusterDeleteStep { provider }));

    if params.dry_run {
        println!("📋 Planned steps for cluster '{cluster_name}':");
        for (name, teardown) in runner.plan() {
            if teardown {
                println!("  🧹 {name} (always runs)");
            } else {
                println!("  ▶️  {name}");
            }
        }
        return Ok(0);
    }

    // One run per cluster per host: concurrent runs must not share the
    // cluster or the server log.
    let lock_path = std::env::temp_dir().join(format!("kindling-{cluster_name}.lock"));
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("opening run lock {}", lock_path.display()))?;
    let mut run_lock = fd_lock::RwLock::new(lock_file);
    let _lock_guard = run_lock.try_write().map_err(|_| {
        anyhow!("another kindling run already holds cluster '{cluster_name}' on this host")
    })?;

    let shutdown = ShutdownCoordinator::install();
    runner = runner.with_cancellation(shutdown.receiver());

    let run_id = generate_run_id();
    println!("🔥 Pipeline run {run_id} starting (cluster '{cluster_name}')");

    let span = create_run_span(&run_id, &cluster_name);
    let mut ctx = RunContext::new(run_id, cluster_name);
    let report = runner.run(&mut ctx).instrument(span).await;

    if let Some(report_arg) = params.report {
        let path = if report_arg.is_empty() {
            PathBuf::from(&cfg.workspace.report_dir).join(format!("run-{}.json", report.run_id))
        } else {
            PathBuf::from(report_arg)
        };
        report.write_json(&path)?;
        println!("📄 Report written to {}", path.display());
    }

    report.print_summary();
    Ok(report.exit_code())
}
