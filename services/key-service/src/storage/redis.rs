//! Redis-backed key store.
//!
//! Each entity URN maps to one Redis hash at
//! `<project_id>:<collection>:<urn>` holding raw-byte fields, `encKey` and
//! `sigKey` for current documents or `publicKey` for legacy ones. Writes run
//! `DEL` + `HSET` inside `MULTI/EXEC`, so a reader sees either the previous
//! document or the new one in full and stale legacy fields never survive an
//! overwrite.

use std::collections::HashMap;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, RedisError, RedisResult};
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::document::KeyDocument;
use super::error::{StorageError, StorageResult};
use super::{KeyStore, LegacyKeyStore, resolve_document};
use crate::keys::PublicKeys;
use crate::urn::EntityUrn;

/// Connection settings for [`RedisKeyStore`].
#[derive(Debug, Clone)]
pub struct RedisKeyStoreConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`
    pub url: String,
    /// Project namespace prepended to every key
    pub project_id: String,
    /// Collection name, the second key segment
    pub collection: String,
}

/// [`KeyStore`] implementation backed by Redis hashes.
#[derive(Clone)]
pub struct RedisKeyStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisKeyStore {
    /// Connects to Redis and returns a ready store.
    pub async fn connect(config: &RedisKeyStoreConfig) -> RedisResult<Self> {
        let client = ::redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        info!(
            project_id = %config.project_id,
            collection = %config.collection,
            "Using Redis key store"
        );

        Ok(Self::with_connection(
            conn,
            &config.project_id,
            &config.collection,
        ))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn with_connection(conn: ConnectionManager, project_id: &str, collection: &str) -> Self {
        Self {
            conn,
            key_prefix: document_prefix(project_id, collection),
        }
    }

    fn document_key(&self, urn: &EntityUrn) -> String {
        format!("{}{}", self.key_prefix, urn)
    }

    async fn replace_document(&self, urn: &EntityUrn, document: &KeyDocument) -> StorageResult<()> {
        let key = self.document_key(urn);
        let mut conn = self.conn.clone();
        debug!(entity_urn = %urn, key = %key, "Storing keys");

        let result: RedisResult<()> = replace_pipeline(&key, document)
            .query_async(&mut conn)
            .await;

        result.map_err(|e| {
            error!(entity_urn = %urn, error = %e, "Failed to store keys");
            map_redis_error(urn, &e)
        })?;

        debug!(entity_urn = %urn, "Successfully stored keys");
        Ok(())
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    async fn store_public_keys(&self, urn: &EntityUrn, keys: &PublicKeys) -> StorageResult<()> {
        self.replace_document(urn, &KeyDocument::current(keys)).await
    }

    async fn get_public_keys(&self, urn: &EntityUrn) -> StorageResult<PublicKeys> {
        let key = self.document_key(urn);
        let mut conn = self.conn.clone();
        debug!(entity_urn = %urn, "Getting keys");

        // HGETALL on a missing key yields an empty map
        let fields: HashMap<String, Vec<u8>> = conn.hgetall(&key).await.map_err(|e| {
            error!(entity_urn = %urn, error = %e, "Failed to get key document");
            map_redis_error(urn, &e)
        })?;

        let document = (!fields.is_empty()).then(|| KeyDocument::from_fields(fields));
        resolve_document(urn, document)
    }
}

#[async_trait]
impl LegacyKeyStore for RedisKeyStore {
    async fn store_legacy_key(&self, urn: &EntityUrn, key: &[u8]) -> StorageResult<()> {
        self.replace_document(urn, &KeyDocument::legacy(key)).await
    }
}

/// Key prefix shared by every document of one collection.
fn document_prefix(project_id: &str, collection: &str) -> String {
    if project_id.is_empty() {
        format!("{collection}:")
    } else {
        format!("{project_id}:{collection}:")
    }
}

/// `MULTI; DEL key; HSET key fields..; EXEC`. Dropping the old hash first
/// keeps fields of the previous shape from surviving the write.
fn replace_pipeline(key: &str, document: &KeyDocument) -> ::redis::Pipeline {
    let mut pipe = ::redis::pipe();
    pipe.atomic()
        .del(key)
        .ignore()
        .hset_multiple(key, &document.fields())
        .ignore();
    pipe
}

fn map_redis_error(urn: &EntityUrn, err: &RedisError) -> StorageError {
    if err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
        || err.is_io_error()
    {
        StorageError::connection(urn.as_str(), err.to_string())
    } else {
        StorageError::backend(urn.as_str(), err.to_string())
    }
}
