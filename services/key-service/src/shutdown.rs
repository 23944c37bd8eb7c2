//! Graceful Shutdown Module
//!
//! Shutdown runs in two phases. Draining starts on SIGINT/SIGTERM: the server
//! stops accepting connections and in-flight requests keep running. Once the
//! grace period has passed the abort token is cancelled, so every storage call
//! still in flight returns `Cancelled` and its request completes with 503.

use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Shutdown coordinator for graceful termination
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    drain: CancellationToken,
    abort: CancellationToken,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts draining.
    pub fn initiate(&self) {
        if !self.drain.is_cancelled() {
            info!("Initiating graceful shutdown");
        }
        self.drain.cancel();
    }

    /// Returns true once draining has started
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.drain.is_cancelled()
    }

    /// Resolves when draining starts.
    pub async fn draining(&self) {
        self.drain.cancelled().await;
    }

    /// Token for one request; cancelled when the grace period runs out.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.abort.child_token()
    }

    /// Waits for draining, then for `grace`, then aborts whatever is still running.
    pub async fn enforce_deadline(self, grace: Duration) {
        self.drain.cancelled().await;
        tokio::time::sleep(grace).await;
        warn!(
            grace_secs = grace.as_secs_f64(),
            "Shutdown timeout reached, cancelling in-flight requests"
        );
        self.abort.cancel();
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
