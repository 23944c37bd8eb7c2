//! Key store/retrieve handlers.
//!
//! Store checks run in a fixed order and the first failure wins:
//! subject (401), URN (400), ownership (403), body (400), non-empty keys (400).
//! Storage is only touched once all of them pass.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error, info, warn};

use super::ApiState;
use crate::auth::Caller;
use crate::error::KeyServiceError;
use crate::keys::PublicKeys;
use crate::metrics;
use crate::storage::run_cancellable;
use crate::urn::EntityUrn;

/// `POST /keys/{urn}`: publish the caller's own key pair.
pub async fn store_keys(
    State(state): State<ApiState>,
    Caller(subject): Caller,
    Path(raw_urn): Path<String>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let result = store(&state, subject.as_ref().map(|s| s.as_str()), &raw_urn, &body).await;
    finish("store", started, result)
}

/// `GET /keys/{urn}`: fetch an entity's key pair. Public.
pub async fn get_keys(State(state): State<ApiState>, Path(raw_urn): Path<String>) -> Response {
    let started = Instant::now();
    let result = retrieve(&state, &raw_urn).await.map(Json);
    finish("get", started, result)
}

/// `OPTIONS /keys/{urn}`. CORS headers come from the CORS layer.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn store(
    state: &ApiState,
    subject: Option<&str>,
    raw_urn: &str,
    body: &[u8],
) -> Result<StatusCode, KeyServiceError> {
    let Some(subject) = subject else {
        debug!("Store rejected: no authenticated subject");
        return Err(KeyServiceError::Unauthorized);
    };

    let urn = parse_urn(raw_urn)?;

    if !urn.is_owned_by(subject) {
        warn!(
            entity_urn = %urn,
            subject = %subject,
            target_entity_id = %urn.entity_id(),
            "Store rejected: subject does not own entity"
        );
        return Err(KeyServiceError::Forbidden {
            subject: subject.to_string(),
            entity_id: urn.entity_id().to_string(),
        });
    }

    let keys: PublicKeys = serde_json::from_slice(body).map_err(|e| {
        warn!(entity_urn = %urn, error = %e, "Failed to decode request body");
        KeyServiceError::InvalidBody(e)
    })?;

    if !keys.is_complete() {
        warn!(entity_urn = %urn, "Store request missing encKey or sigKey");
        return Err(KeyServiceError::EmptyKeys);
    }

    let cancel = state.shutdown.request_token();
    run_cancellable(
        &urn,
        &cancel,
        state.request_timeout,
        state.store.store_public_keys(&urn, &keys),
    )
    .await
    .map_err(|e| {
        error!(entity_urn = %urn, error = %e, "Failed to store public keys");
        KeyServiceError::from_write(e)
    })?;

    info!(entity_urn = %urn, "Stored public keys");
    Ok(StatusCode::CREATED)
}

async fn retrieve(state: &ApiState, raw_urn: &str) -> Result<PublicKeys, KeyServiceError> {
    let urn = parse_urn(raw_urn)?;

    let cancel = state.shutdown.request_token();
    let keys = run_cancellable(
        &urn,
        &cancel,
        state.request_timeout,
        state.store.get_public_keys(&urn),
    )
    .await
    .map_err(|e| {
        let err = KeyServiceError::from_read(e);
        if err.status_code().is_server_error() {
            error!(entity_urn = %urn, error = ?err, "Failed to retrieve public keys");
        } else {
            debug!(entity_urn = %urn, "Key not found");
        }
        err
    })?;

    debug!(entity_urn = %urn, "Retrieved public keys");
    Ok(keys)
}

fn parse_urn(raw: &str) -> Result<EntityUrn, KeyServiceError> {
    EntityUrn::parse(raw).map_err(|e| {
        warn!(raw_urn = %raw, error = %e, "Invalid URN format");
        KeyServiceError::InvalidUrn(e)
    })
}

fn finish<T: IntoResponse>(
    operation: &str,
    started: Instant,
    result: Result<T, KeyServiceError>,
) -> Response {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::record_request(operation, outcome, started.elapsed().as_secs_f64());
    result.into_response()
}
