//! HTTP API
//!
//! | Method  | Path          | Auth   |
//! |---------|---------------|--------|
//! | GET     | `/keys/{urn}` | none   |
//! | POST    | `/keys/{urn}` | bearer |
//! | OPTIONS | `/keys/{urn}` | none   |
//! | GET     | `/healthz`    | none   |
//! | GET     | `/readyz`     | none   |
//! | GET     | `/metrics`    | none   |

mod health;
mod keys;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::auth::{self, Authenticator};
use crate::shutdown::ShutdownCoordinator;
use crate::storage::KeyStore;

pub use health::{healthz, metrics, readyz};
pub use keys::{get_keys, preflight, store_keys};

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    /// Key storage backend
    pub store: Arc<dyn KeyStore>,
    /// Source of request-scoped cancellation tokens
    pub shutdown: ShutdownCoordinator,
    /// Deadline for each storage call
    pub request_timeout: Duration,
    ready: Arc<AtomicBool>,
}

impl ApiState {
    /// Creates state that reports not-ready until [`ApiState::mark_ready`].
    pub fn new(
        store: Arc<dyn KeyStore>,
        shutdown: ShutdownCoordinator,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            shutdown,
            request_timeout,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flags the service as able to take traffic.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Ready and not shutting down.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.shutdown.is_shutting_down()
    }
}

/// Builds the API router. Authentication runs only on the key routes.
pub fn router(state: ApiState, authenticator: Arc<dyn Authenticator>) -> Router {
    Router::new()
        .route(
            "/keys/{urn}",
            get(get_keys).post(store_keys).options(preflight),
        )
        .route_layer(middleware::from_fn_with_state(
            authenticator,
            auth::authenticate,
        ))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}
