//! Physical key document and format reconciliation.
//!
//! Two document shapes share one namespace:
//!
//! | Shape   | Fields                  |
//! |---------|-------------------------|
//! | current | `encKey`, `sigKey`      |
//! | legacy  | `publicKey`             |
//!
//! Backends load whatever fields exist into a [`KeyDocument`] and call
//! [`KeyDocument::reconcile`], which always yields a current-format
//! [`PublicKeys`]. Nothing above the storage layer ever sees the legacy shape.

use std::collections::HashMap;

use super::error::{StorageError, StorageResult};
use crate::keys::PublicKeys;

/// Field holding the encryption key in a current-format document.
pub const ENC_KEY_FIELD: &str = "encKey";
/// Field holding the signing key in a current-format document.
pub const SIG_KEY_FIELD: &str = "sigKey";
/// Field holding the single key in a legacy document.
pub const LEGACY_KEY_FIELD: &str = "publicKey";

/// Raw stored document; a field is `None` when absent and `Some(vec![])` when present but empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDocument {
    /// `encKey` field
    pub enc_key: Option<Vec<u8>>,
    /// `sigKey` field
    pub sig_key: Option<Vec<u8>>,
    /// `publicKey` field
    pub public_key: Option<Vec<u8>>,
}

/// Which shape a document was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Dual-key document
    Current,
    /// Single-key document from the V1 API
    Legacy,
}

impl DocumentFormat {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        }
    }
}

impl KeyDocument {
    /// Current-format document for a record.
    #[must_use]
    pub fn current(keys: &PublicKeys) -> Self {
        Self {
            enc_key: Some(keys.enc_key.clone()),
            sig_key: Some(keys.sig_key.clone()),
            public_key: None,
        }
    }

    /// Legacy single-key document.
    #[must_use]
    pub fn legacy(key: &[u8]) -> Self {
        Self {
            enc_key: None,
            sig_key: None,
            public_key: Some(key.to_vec()),
        }
    }

    /// Builds a document from a field map such as a Redis hash. Unrelated fields are ignored.
    #[must_use]
    pub fn from_fields(mut fields: HashMap<String, Vec<u8>>) -> Self {
        Self {
            enc_key: fields.remove(ENC_KEY_FIELD),
            sig_key: fields.remove(SIG_KEY_FIELD),
            public_key: fields.remove(LEGACY_KEY_FIELD),
        }
    }

    /// Field/value pairs to persist, in a stable order.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, &[u8])> {
        [
            (ENC_KEY_FIELD, self.enc_key.as_deref()),
            (SIG_KEY_FIELD, self.sig_key.as_deref()),
            (LEGACY_KEY_FIELD, self.public_key.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }

    /// Shape of this document, or `None` if it matches neither.
    #[must_use]
    pub fn format(&self) -> Option<DocumentFormat> {
        if self.enc_key.is_some() || self.sig_key.is_some() {
            Some(DocumentFormat::Current)
        } else if self.public_key.is_some() {
            Some(DocumentFormat::Legacy)
        } else {
            None
        }
    }

    /// Normalizes the document into a current-format record.
    ///
    /// The current shape wins whenever either of its fields is present, even if
    /// empty; a missing counterpart reads as empty. Otherwise the legacy key
    /// becomes the encryption key with an empty signing key. A document with
    /// none of the fields is reported as [`StorageError::UnknownFormat`].
    pub fn reconcile(self, urn: &str) -> StorageResult<(PublicKeys, DocumentFormat)> {
        match self.format() {
            Some(DocumentFormat::Current) => Ok((
                PublicKeys::new(
                    self.enc_key.unwrap_or_default(),
                    self.sig_key.unwrap_or_default(),
                ),
                DocumentFormat::Current,
            )),
            Some(DocumentFormat::Legacy) => Ok((
                PublicKeys::from_legacy(self.public_key.unwrap_or_default()),
                DocumentFormat::Legacy,
            )),
            None => Err(StorageError::unknown_format(urn)),
        }
    }
}
