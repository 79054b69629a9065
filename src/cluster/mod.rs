//! Ephemeral cluster provisioning
//!
//! A `ClusterProvider` owns the create/delete lifecycle of the disposable
//! Kubernetes cluster a run tests against. The real provider shells out to
//! the `kind` CLI through the command executor seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::exec::{CommandExecutor, CommandSpec};

#[async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Create the named cluster. Fails if a cluster of that name exists:
    /// a leak from a prior run is surfaced, not silently reused.
    async fn create(&self, name: &str) -> Result<(), PipelineError>;

    /// Delete the named cluster. Idempotent: deleting an absent cluster
    /// succeeds, so repeated teardowns leave no residue.
    async fn delete(&self, name: &str) -> Result<(), PipelineError>;

    /// Whether the named cluster currently exists.
    async fn exists(&self, name: &str) -> Result<bool, PipelineError>;
}

/// kind-backed provider (Kubernetes in Docker)
pub struct KindClusterProvider {
    executor: Arc<dyn CommandExecutor>,
    command_timeout: Duration,
}

impl KindClusterProvider {
    pub fn new(executor: Arc<dyn CommandExecutor>, command_timeout: Duration) -> Self {
        Self {
            executor,
            command_timeout,
        }
    }

    fn kind(&self) -> CommandSpec {
        CommandSpec::new("kind").timeout(self.command_timeout)
    }
}

#[async_trait]
impl ClusterProvider for KindClusterProvider {
    async fn create(&self, name: &str) -> Result<(), PipelineError> {
        if self.exists(name).await? {
            return Err(PipelineError::setup(
                "cluster",
                format!("cluster '{name}' already exists; run `kindling teardown` first"),
            ));
        }

        info!(cluster = %name, "Creating ephemeral cluster");
        let output = self
            .executor
            .execute(self.kind().args(["create", "cluster", "--name"]).arg(name))
            .await?;

        if !output.success() {
            return Err(PipelineError::setup(
                "cluster",
                format!(
                    "kind create cluster '{}' failed: {}",
                    name,
                    output.failure_detail()
                ),
            ));
        }

        info!(cluster = %name, "Ephemeral cluster ready");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), PipelineError> {
        let exists = self
            .exists(name)
            .await
            .map_err(|e| PipelineError::teardown(format!("cluster lookup failed: {e}")))?;
        if !exists {
            info!(cluster = %name, "Cluster already absent, nothing to delete");
            return Ok(());
        }

        info!(cluster = %name, "Deleting ephemeral cluster");
        let output = self
            .executor
            .execute(self.kind().args(["delete", "cluster", "--name"]).arg(name))
            .await
            .map_err(|e| PipelineError::teardown(e.to_string()))?;

        if !output.success() {
            warn!(cluster = %name, detail = %output.failure_detail(), "Cluster deletion failed");
            return Err(PipelineError::teardown(format!(
                "kind delete cluster '{}' failed: {}",
                name,
                output.failure_detail()
            )));
        }

        info!(cluster = %name, "Ephemeral cluster deleted");
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, PipelineError> {
        let output = self
            .executor
            .execute(self.kind().args(["get", "clusters"]))
            .await?;

        if !output.success() {
            return Err(PipelineError::setup(
                "cluster",
                format!("kind get clusters failed: {}", output.failure_detail()),
            ));
        }

        Ok(output.stdout.lines().any(|line| line.trim() == name))
    }
}
