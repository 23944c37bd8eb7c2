//! Key storage backends.
//!
//! [`KeyStore`] is the capability the HTTP layer depends on. Two backends
//! implement it:
//!
//! - [`MemoryKeyStore`]: process-local map behind a single reader/writer lock
//! - [`RedisKeyStore`]: one Redis hash per entity URN
//!
//! Both persist [`KeyDocument`]s and funnel every read through
//! [`KeyDocument::reconcile`], so legacy single-key documents come back as
//! current-format [`PublicKeys`] without a migration pass.

pub mod document;
pub mod error;
pub mod memory;
pub mod redis;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use document::{DocumentFormat, KeyDocument};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryKeyStore;
pub use self::redis::{RedisKeyStore, RedisKeyStoreConfig};

use crate::keys::PublicKeys;
use crate::metrics;
use crate::urn::EntityUrn;

/// Persistence for public key pairs, keyed by entity URN.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Stores `keys` for `urn`, replacing whatever document was there.
    ///
    /// No validation happens here; empty fields are stored as given.
    async fn store_public_keys(&self, urn: &EntityUrn, keys: &PublicKeys) -> StorageResult<()>;

    /// Retrieves the key pair for `urn`, normalizing legacy documents.
    async fn get_public_keys(&self, urn: &EntityUrn) -> StorageResult<PublicKeys>;
}

/// Writer for the retired single-key document shape.
///
/// Kept so compatibility tooling and tests can produce legacy documents; the
/// HTTP API never routes to it.
#[async_trait]
pub trait LegacyKeyStore: Send + Sync {
    /// Stores a single key for `urn` in the legacy shape, replacing any document.
    async fn store_legacy_key(&self, urn: &EntityUrn, key: &[u8]) -> StorageResult<()>;
}

/// Turns a raw lookup result into the record handed to callers.
///
/// Shared by all backends so format handling, logging and metrics stay uniform.
pub(crate) fn resolve_document(
    urn: &EntityUrn,
    document: Option<KeyDocument>,
) -> StorageResult<PublicKeys> {
    let Some(document) = document else {
        debug!(entity_urn = %urn, "Keys not found");
        return Err(StorageError::not_found(urn.as_str()));
    };

    match document.reconcile(urn.as_str()) {
        Ok((keys, format)) => {
            metrics::record_document_read(format.as_str());
            if format == DocumentFormat::Legacy {
                debug!(entity_urn = %urn, "Read legacy single-key document");
            }
            Ok(keys)
        }
        Err(err) => {
            metrics::record_document_read("unknown");
            warn!(
                entity_urn = %urn,
                event_type = "unknown_document_format",
                "Stored key document matches no known format"
            );
            Err(err)
        }
    }
}

/// Runs a storage operation under a request-scoped cancellation token and deadline.
///
/// Whichever fires first drops the in-flight future and the matching error is
/// returned; the operation is never retried.
pub async fn run_cancellable<T, F>(
    urn: &EntityUrn,
    cancel: &CancellationToken,
    deadline: Duration,
    operation: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StorageError::Cancelled {
            urn: urn.to_string(),
        }),
        result = tokio::time::timeout(deadline, operation) => match result {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout {
                urn: urn.to_string(),
                duration: deadline,
            }),
        },
    }
}
