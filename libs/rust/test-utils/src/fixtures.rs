//! Test fixtures with sample data.
//!
//! This module provides pre-built identifiers, request bodies and signed
//! bearer tokens for use in tests.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

/// HMAC secret shared by [`TokenFactory::default`] and test authenticators.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-for-key-service";

/// Sample user id.
pub const ALICE: &str = "alice";
/// Second sample user id.
pub const BOB: &str = "bob";

/// Sample key material.
pub const SAMPLE_ENC_KEY: &[u8] = b"sample-encryption-key";
/// Sample key material.
pub const SAMPLE_SIG_KEY: &[u8] = b"sample-signing-key";

/// URN string for a secure-messaging user.
#[must_use]
pub fn user_urn(id: &str) -> String {
    format!("urn:sm:user:{id}")
}

/// Request path for a URN string.
#[must_use]
pub fn keys_path(urn: &str) -> String {
    format!("/keys/{urn}")
}

/// JSON body for a store request.
#[must_use]
pub fn store_body(enc_key: &[u8], sig_key: &[u8]) -> String {
    serde_json::json!({
        "encKey": STANDARD.encode(enc_key),
        "sigKey": STANDARD.encode(sig_key),
    })
    .to_string()
}

/// JSON body carrying the sample keys.
#[must_use]
pub fn sample_store_body() -> String {
    store_body(SAMPLE_ENC_KEY, SAMPLE_SIG_KEY)
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<&'a str>,
}

/// Mints HS256 bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenFactory {
    secret: String,
    issuer: Option<String>,
}

impl Default for TokenFactory {
    fn default() -> Self {
        Self {
            secret: TEST_JWT_SECRET.to_string(),
            issuer: None,
        }
    }
}

impl TokenFactory {
    /// Factory signing with `secret`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
        }
    }

    /// Stamp tokens with an `iss` claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Token for `subject`, valid for one hour.
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be encoded.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn token(&self, subject: &str) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let claims = TestClaims {
            sub: subject,
            exp: now + 3600,
            iss: self.issuer.as_deref(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("Failed to encode test token")
    }

    /// `Authorization` header value for `subject`.
    #[must_use]
    pub fn bearer(&self, subject: &str) -> String {
        format!("Bearer {}", self.token(subject))
    }
}
