//! Service assembly and lifecycle.
//!
//! [`KeyService`] wires storage, authentication, CORS and request tracing
//! around the API router and runs it until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{self, ApiState};
use crate::auth::{Authenticator, JwtAuthenticator};
use crate::config::{Config, StorageBackend};
use crate::shutdown::{wait_for_signal, ShutdownCoordinator};
use crate::storage::{KeyStore, MemoryKeyStore, RedisKeyStore, RedisKeyStoreConfig};

const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Runtime knobs that are not collaborators.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Deadline for each storage call
    pub request_timeout: Duration,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout: Duration,
    /// Origins allowed by CORS; `*` allows any
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout,
            shutdown_timeout: config.shutdown_timeout,
            cors_allowed_origins: config.cors_allowed_origins.clone(),
        }
    }
}

/// The assembled key service.
pub struct KeyService {
    state: ApiState,
    authenticator: Arc<dyn Authenticator>,
    shutdown: ShutdownCoordinator,
    options: ServiceOptions,
}

impl KeyService {
    /// Assembles the service from explicit collaborators.
    pub fn new(
        store: Arc<dyn KeyStore>,
        authenticator: Arc<dyn Authenticator>,
        options: ServiceOptions,
    ) -> Self {
        let shutdown = ShutdownCoordinator::new();
        let state = ApiState::new(store, shutdown.clone(), options.request_timeout);

        Self {
            state,
            authenticator,
            shutdown,
            options,
        }
    }

    /// Builds the storage backend and authenticator named by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ::redis::RedisError> {
        let store = build_store(config).await?;
        let authenticator: Arc<dyn Authenticator> = Arc::new(JwtAuthenticator::new(
            config.jwt_secret.as_bytes(),
            config.issuer(),
        ));
        Ok(Self::new(store, authenticator, ServiceOptions::from(config)))
    }

    /// Handle for triggering or observing shutdown.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Handler state, exposed for readiness checks.
    #[must_use]
    pub fn state(&self) -> &ApiState {
        &self.state
    }

    /// Full router with tracing and CORS layers. Tracing is outermost so
    /// preflight responses produced by the CORS layer get a span too.
    pub fn router(&self) -> Router {
        api::router(self.state.clone(), Arc::clone(&self.authenticator)).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&self.options.cors_allowed_origins)),
        )
    }

    /// Serves on `listener` until SIGINT/SIGTERM or [`ShutdownCoordinator::initiate`].
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let app = self.router();

        let signal_task = {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                wait_for_signal().await;
                shutdown.initiate();
            })
        };
        let deadline_task = tokio::spawn(
            self.shutdown
                .clone()
                .enforce_deadline(self.options.shutdown_timeout),
        );

        self.state.mark_ready();
        info!(%addr, "Key service listening");

        let drain = self.shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { drain.draining().await })
            .await;

        signal_task.abort();
        deadline_task.abort();
        info!("Key service stopped");
        result
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn KeyStore>, ::redis::RedisError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory key store");
            Ok(Arc::new(MemoryKeyStore::new()))
        }
        StorageBackend::Redis => {
            let store = RedisKeyStore::connect(&RedisKeyStoreConfig {
                url: config.storage.redis_url.clone().unwrap_or_default(),
                project_id: config.project_id.clone(),
                collection: config.storage.collection.clone(),
            })
            .await?;
            Ok(Arc::new(store))
        }
    }
}

/// CORS policy for the configured origins. Invalid origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(CORS_MAX_AGE);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
