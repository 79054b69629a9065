use tokio::sync::watch;
use tracing::{info, warn};

/// Signal-driven cancellation for in-flight runs.
///
/// The runner observes the receiver between and during steps; a SIGINT or
/// SIGTERM cancels the active non-teardown step while the teardown phase
/// still executes.
pub struct ShutdownCoordinator {
    rx: watch::Receiver<bool>,
}

impl ShutdownCoordinator {
    /// Install signal handlers and start watching for shutdown requests
    pub fn install() -> Self {
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received, cancelling run and moving to teardown");
            if tx.send(true).is_err() {
                warn!("Shutdown requested but no run was listening");
            }
        });

        Self { rx }
    }

    /// Receiver handed to the pipeline runner
    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, falling back to ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
