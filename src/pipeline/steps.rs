//! Concrete pipeline steps
//!
//! Thin adapters binding the domain modules (workspace, toolchain, cluster,
//! service, readiness, test execution) to the runner's `Step` seam. Order is
//! composed in the run command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::cluster::ClusterProvider;
use crate::error::PipelineError;
use crate::exec::{CommandExecutor, CommandSpec};
use crate::pipeline::step::{RunContext, Step};
use crate::readiness::ReadinessProbe;
use crate::service::ServiceHandle;
use crate::toolchain;
use crate::workspace;

/// Validate the checkout and record the revision under test
pub struct WorkspaceStep {
    pub root: PathBuf,
    pub test_dir: PathBuf,
}

#[async_trait]
impl Step for WorkspaceStep {
    fn name(&self) -> &'static str {
        "workspace"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        ctx.workspace = Some(workspace::inspect(&self.root, &self.test_dir)?);
        Ok(())
    }
}

/// Verify every required external CLI before touching the cluster
pub struct ToolchainStep {
    pub executor: Arc<dyn CommandExecutor>,
}

#[async_trait]
impl Step for ToolchainStep {
    fn name(&self) -> &'static str {
        "toolchain"
    }

    async fn execute(&self, _ctx: &mut RunContext) -> Result<(), PipelineError> {
        let reports = toolchain::verify_toolchain(&self.executor).await?;
        info!(tools = reports.len(), "Toolchain verified");
        Ok(())
    }
}

/// Create the ephemeral cluster named in the run context
pub struct ClusterCreateStep {
    pub provider: Arc<dyn ClusterProvider>,
}

#[async_trait]
impl Step for ClusterCreateStep {
    fn name(&self) -> &'static str {
        "cluster-create"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        self.provider.create(&ctx.cluster_name).await
    }
}

/// Start the server under test in the background
pub struct ServiceStartStep {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub log_path: PathBuf,
}

#[async_trait]
impl Step for ServiceStartStep {
    fn name(&self) -> &'static str {
        "service-start"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let handle = ServiceHandle::spawn(&self.command, &self.args, &self.env, &self.log_path)?;
        ctx.server_log = Some(handle.log_path().to_path_buf());
        ctx.service = Some(handle);
        Ok(())
    }
}

/// Block until the server answers its health endpoint or the budget elapses.
///
/// A server that exits while we wait fails the gate immediately instead of
/// polling out the clock.
pub struct ReadinessStep {
    pub probe: ReadinessProbe,
    pub budget: Duration,
}

#[async_trait]
impl Step for ReadinessStep {
    fn name(&self) -> &'static str {
        "readiness"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let started = tokio::time::Instant::now();
        let deadline = started + self.budget;
        let mut attempts: u64 = 0;

        loop {
            if let Some(service) = ctx.service.as_mut() {
                if let Some(code) = service.early_exit()? {
                    return Err(PipelineError::setup(
                        "service",
                        format!(
                            "server exited with code {code} before becoming ready; see {}",
                            service.log_path().display()
                        ),
                    ));
                }
            }

            attempts += 1;
            if self.probe.check_once().await {
                info!(
                    url = self.probe.url(),
                    waited_ms = started.elapsed().as_millis() as u64,
                    attempts,
                    "Server ready"
                );
                return Ok(());
            }

            if tokio::time::Instant::now() + self.probe.interval() >= deadline {
                return Err(PipelineError::ReadinessTimeout {
                    budget_secs: self.budget.as_secs(),
                    attempts,
                });
            }
            tokio::time::sleep(self.probe.interval()).await;
        }
    }
}

/// Run the integration suite; its exit code is the run's verdict
pub struct TestSuiteStep {
    pub executor: Arc<dyn CommandExecutor>,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

#[async_trait]
impl Step for TestSuiteStep {
    fn name(&self) -> &'static str {
        "integration-tests"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let cwd = ctx
            .workspace
            .as_ref()
            .map(|w| w.test_dir.clone())
            .ok_or_else(|| PipelineError::setup("tests", "workspace step did not run"))?;

        let mut spec = CommandSpec::new(&self.command)
            .args(self.args.iter().cloned())
            .cwd(cwd);
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }

        // No per-command timeout: the job deadline governs the suite
        let output = self.executor.execute(spec).await?;
        if output.success() {
            info!("Integration suite passed");
            Ok(())
        } else {
            Err(PipelineError::TestsFailed {
                exit_code: output.status_code,
            })
        }
    }
}

/// Teardown: stop the background server if one is running
pub struct ServiceStopStep;

#[async_trait]
impl Step for ServiceStopStep {
    fn name(&self) -> &'static str {
        "service-stop"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        match ctx.service.take() {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }
}

/// Teardown: delete the ephemeral cluster, idempotently
pub struct ClusterDeleteStep {
    pub provider: Arc<dyn ClusterProvider>,
}

#[async_trait]
impl Step for ClusterDeleteStep {
    fn name(&self) -> &'static str {
        "cluster-delete"
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        self.provider.delete(&ctx.cluster_name).await
    }
}
