//! Step seam and the state threaded through a run

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::service::ServiceHandle;
use crate::workspace::WorkspaceInfo;

/// Mutable state shared by the steps of one run.
///
/// Earlier steps deposit what later steps and the report need: the validated
/// workspace, the background server handle, the server log location.
pub struct RunContext {
    pub run_id: String,
    pub cluster_name: String,
    pub workspace: Option<WorkspaceInfo>,
    pub service: Option<ServiceHandle>,
    pub server_log: Option<PathBuf>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            cluster_name: cluster_name.into(),
            workspace: None,
            service: None,
            server_log: None,
        }
    }
}

/// One pipeline step.
///
/// Steps are objects so the runner and the tests can compose arbitrary
/// sequences; the runner owns ordering, deadlines, and the teardown
/// guarantee.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut RunContext) -> Result<(), PipelineError>;
}
