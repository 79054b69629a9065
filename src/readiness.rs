//! Health-endpoint readiness gate
//!
//! A fixed-interval poll against the server's health URL. Connection errors
//! and non-2xx responses are expected while the server boots; only the
//! deadline turns them into a failure. No backoff, no jitter, no attempt
//! cap: this is a gate, not a retry policy.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::PipelineError;

pub struct ReadinessProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::setup("readiness", format!("http client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            interval,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One probe attempt: true on any 2xx response.
    pub async fn check_once(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let ready = response.status().is_success();
                debug!(url = %self.url, status = %response.status(), ready, "Readiness probe");
                ready
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Readiness probe not reachable yet");
                false
            }
        }
    }

    /// Poll until a 2xx response or the budget elapses.
    pub async fn wait_ready(&self, budget: Duration) -> Result<Duration, PipelineError> {
        let started = tokio::time::Instant::now();
        let deadline = started + budget;
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            if self.check_once().await {
                let waited = started.elapsed();
                info!(url = %self.url, waited_ms = waited.as_millis() as u64, attempts, "Server ready");
                return Ok(waited);
            }

            if tokio::time::Instant::now() + self.interval >= deadline {
                return Err(PipelineError::ReadinessTimeout {
                    budget_secs: budget.as_secs(),
                    attempts,
                });
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
