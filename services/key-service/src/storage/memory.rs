//! In-memory key store.
//!
//! A `HashMap` of canonical URN → [`KeyDocument`] guarded by one
//! [`parking_lot::RwLock`]. Readers share the lock, writers hold it
//! exclusively, and the lock is never held across an `.await`. A store that
//! returns successfully is therefore visible to every later read.
//!
//! Cloning is cheap and clones share the same map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::document::KeyDocument;
use super::error::StorageResult;
use super::{KeyStore, LegacyKeyStore, resolve_document};
use crate::keys::PublicKeys;
use crate::urn::EntityUrn;

/// Thread-safe in-memory implementation of [`KeyStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    documents: Arc<RwLock<HashMap<String, KeyDocument>>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Inserts a raw document, bypassing the typed write paths.
    /// Used to reproduce documents written by other tooling.
    pub fn insert_document(&self, urn: &EntityUrn, document: KeyDocument) {
        self.documents.write().insert(urn.to_string(), document);
    }

    fn put(&self, urn: &EntityUrn, document: KeyDocument) {
        debug!(entity_urn = %urn, "Storing keys");
        self.documents.write().insert(urn.to_string(), document);
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn store_public_keys(&self, urn: &EntityUrn, keys: &PublicKeys) -> StorageResult<()> {
        self.put(urn, KeyDocument::current(keys));
        Ok(())
    }

    async fn get_public_keys(&self, urn: &EntityUrn) -> StorageResult<PublicKeys> {
        let document = self.documents.read().get(urn.as_str()).cloned();
        resolve_document(urn, document)
    }
}

#[async_trait]
impl LegacyKeyStore for MemoryKeyStore {
    async fn store_legacy_key(&self, urn: &EntityUrn, key: &[u8]) -> StorageResult<()> {
        self.put(urn, KeyDocument::legacy(key));
        Ok(())
    }
}
