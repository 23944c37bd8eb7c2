//! Public key pair record.
//!
//! On the wire both keys travel as standard base64 strings:
//! `{"encKey":"AQID","sigKey":"BAUG"}`. Internally they are raw bytes.

use serde::{Deserialize, Serialize};

/// Encryption and signing public keys published by one entity.
///
/// Either field may be empty when read back from storage (legacy documents
/// carry no signing key); the HTTP write path requires both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeys {
    /// Key used by senders to encrypt to this entity
    #[serde(default, with = "base64_bytes")]
    pub enc_key: Vec<u8>,
    /// Key used to verify signatures made by this entity
    #[serde(default, with = "base64_bytes")]
    pub sig_key: Vec<u8>,
}

impl PublicKeys {
    /// Creates a key pair record.
    pub fn new(enc_key: impl Into<Vec<u8>>, sig_key: impl Into<Vec<u8>>) -> Self {
        Self {
            enc_key: enc_key.into(),
            sig_key: sig_key.into(),
        }
    }

    /// Record shape produced for a legacy single-key document.
    pub fn from_legacy(key: impl Into<Vec<u8>>) -> Self {
        Self {
            enc_key: key.into(),
            sig_key: Vec::new(),
        }
    }

    /// Both keys are present and non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.enc_key.is_empty() && !self.sig_key.is_empty()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        // null is accepted and treated like an absent field
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
