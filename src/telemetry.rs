use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize tracing for the pipeline runner.
///
/// RUST_LOG wins when set; otherwise the configured level applies. JSON
/// output is opt-in for CI log collectors.
pub fn init_telemetry(log_level: &str, json_logs: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    tracing::debug!("kindling telemetry initialized");
    Ok(())
}

/// Generate a correlation ID linking every step of one run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span carrying the common per-run attributes
pub fn create_run_span(run_id: &str, cluster_name: &str) -> tracing::Span {
    tracing::info_span!(
        "pipeline_run",
        run.id = run_id,
        cluster.name = cluster_name,
        otel.kind = "internal"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(generate_run_id(), generate_run_id());
    }
}
