//! Pipeline execution engine
//!
//! Runs the ordered non-teardown steps under one deadline, then the teardown
//! steps under a grace budget. Teardown runs in every case: prior failure,
//! deadline expiry, or interrupt. A teardown failure is recorded as a
//! warning and never overrides the verdict of the steps before it.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::report::{runner_hostname, RunReport, RunVerdict, StepReport, StepStatus};
use crate::pipeline::step::{RunContext, Step};

pub struct PipelineRunner {
    steps: Vec<Box<dyn Step>>,
    teardown_steps: Vec<Box<dyn Step>>,
    job_budget: Duration,
    teardown_grace: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl PipelineRunner {
    pub fn new(job_budget: Duration, teardown_grace: Duration) -> Self {
        Self {
            steps: Vec::new(),
            teardown_steps: Vec::new(),
            job_budget,
            teardown_grace,
            cancel: None,
        }
    }

    /// Append a step that must succeed before the next one begins
    pub fn step(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a step that runs regardless of any prior outcome
    pub fn teardown_step(mut self, step: Box<dyn Step>) -> Self {
        self.teardown_steps.push(step);
        self
    }

    /// Wire signal-driven cancellation into the run
    pub fn with_cancellation(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    /// Names of the configured steps, in execution order (for --dry-run)
    pub fn plan(&self) -> Vec<(&'static str, bool)> {
        self.steps
            .iter()
            .map(|s| (s.name(), false))
            .chain(self.teardown_steps.iter().map(|s| (s.name(), true)))
            .collect()
    }

    pub async fn run(mut self, ctx: &mut RunContext) -> RunReport {
        let started_at = Utc::now();
        let deadline = tokio::time::Instant::now() + self.job_budget;
        let steps = std::mem::take(&mut self.steps);
        let teardown_steps = std::mem::take(&mut self.teardown_steps);

        let mut reports: Vec<StepReport> = Vec::with_capacity(steps.len() + teardown_steps.len());
        let mut failure: Option<PipelineError> = None;

        for step in &steps {
            if failure.is_some() {
                reports.push(StepReport::skipped(step.name()));
                continue;
            }

            info!(step = step.name(), "Step started");
            let begin = std::time::Instant::now();
            let result = self.execute_bounded(step.as_ref(), ctx, deadline).await;
            let duration_ms = begin.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    info!(step = step.name(), duration_ms, "Step passed");
                    reports.push(StepReport::passed(step.name(), duration_ms, false));
                }
                Err(e) => {
                    let status = match &e {
                        PipelineError::Deadline { .. } => StepStatus::TimedOut,
                        _ => StepStatus::Failed,
                    };
                    error!(step = step.name(), duration_ms, error = %e, "Step failed");
                    reports.push(StepReport {
                        name: step.name().to_string(),
                        status,
                        duration_ms,
                        detail: Some(e.to_string()),
                        exit_code: e.test_exit_code(),
                        teardown: false,
                    });
                    failure = Some(e);
                }
            }
        }

        // Teardown always runs, bounded only by its own grace budget so a
        // blown job deadline cannot leak the cluster.
        let grace_deadline = tokio::time::Instant::now() + self.teardown_grace;
        for step in &teardown_steps {
            info!(step = step.name(), "Teardown step started");
            let begin = std::time::Instant::now();
            let result = tokio::time::timeout_at(grace_deadline, step.execute(ctx)).await;
            let duration_ms = begin.elapsed().as_millis() as u64;

            let report = match result {
                Ok(Ok(())) => StepReport::passed(step.name(), duration_ms, true),
                Ok(Err(e)) => {
                    warn!(step = step.name(), error = %e, "Teardown step failed (best-effort, not retried)");
                    StepReport {
                        name: step.name().to_string(),
                        status: StepStatus::Failed,
                        duration_ms,
                        detail: Some(e.to_string()),
                        exit_code: None,
                        teardown: true,
                    }
                }
                Err(_) => {
                    warn!(step = step.name(), "Teardown step ran out of grace budget");
                    StepReport {
                        name: step.name().to_string(),
                        status: StepStatus::TimedOut,
                        duration_ms,
                        detail: Some("teardown grace budget elapsed".to_string()),
                        exit_code: None,
                        teardown: true,
                    }
                }
            };
            reports.push(report);
        }

        let verdict = match &failure {
            None => RunVerdict::Passed,
            Some(PipelineError::Deadline { .. }) => RunVerdict::TimedOut,
            Some(PipelineError::Interrupted) => RunVerdict::Interrupted,
            Some(_) => RunVerdict::Failed,
        };

        RunReport {
            run_id: ctx.run_id.clone(),
            cluster_name: ctx.cluster_name.clone(),
            hostname: runner_hostname(),
            revision: ctx.workspace.as_ref().and_then(|w| w.revision.clone()),
            started_at,
            finished_at: Utc::now(),
            verdict,
            server_log: ctx
                .server_log
                .as_ref()
                .map(|p| p.display().to_string()),
            steps: reports,
        }
    }

    async fn execute_bounded(
        &self,
        step: &dyn Step,
        ctx: &mut RunContext,
        deadline: tokio::time::Instant,
    ) -> Result<(), PipelineError> {
        let budget_secs = self.job_budget.as_secs();
        let mut cancel = self.cancel.clone();

        match cancel.as_mut() {
            Some(rx) => {
                tokio::select! {
                    biased;
                    _ = cancelled(rx) => Err(PipelineError::Interrupted),
                    result = tokio::time::timeout_at(deadline, step.execute(ctx)) => match result {
                        Ok(inner) => inner,
                        Err(_) => Err(PipelineError::Deadline { budget_secs }),
                    },
                }
            }
            None => match tokio::time::timeout_at(deadline, step.execute(ctx)).await {
                Ok(inner) => inner,
                Err(_) => Err(PipelineError::Deadline { budget_secs }),
            },
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    loop {
        if rx.changed().await.is_err() {
            // Sender gone: no signal can arrive anymore
            std::future::pending::<()>().await;
        }
        if *rx.borrow() {
            return;
        }
    }
}
