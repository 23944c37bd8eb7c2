//! Request authentication
//!
//! The store handler only needs "who is calling". [`Authenticator`] turns
//! request headers into an [`AuthenticatedSubject`]; [`authenticate`] is the
//! axum middleware that runs it and parks the subject in the request
//! extensions. The middleware never rejects, so the handler decides whether
//! a missing subject is fatal and public routes stay public.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Authentication failures. Never shown to clients.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Token missing from request")]
    TokenMissing,

    /// Header present but not `Bearer <token>`
    #[error("Invalid token format")]
    InvalidFormat,

    /// Signature, expiry or issuer check failed
    #[error("Token invalid: {0}")]
    TokenInvalid(#[from] jsonwebtoken::errors::Error),

    /// Token verified but carries no usable `sub`
    #[error("Token has no subject")]
    MissingSubject,
}

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(String);

impl AuthenticatedSubject {
    /// Wraps a subject that has already been verified.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Subject identifier, compared with the entity id of a URN.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Handler extractor for the subject left by [`authenticate`], if any.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<AuthenticatedSubject>);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthenticatedSubject>().cloned()))
    }
}

/// Extracts a verified subject from request headers.
pub trait Authenticator: Send + Sync {
    /// Returns the caller's subject or the reason none could be established.
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedSubject, AuthError>;
}

/// Token claims the service reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: u64,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 bearer-token authenticator.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Creates an authenticator for tokens signed with `secret`.
    /// When `issuer` is set, tokens from any other issuer are rejected.
    #[must_use]
    pub fn new(secret: &[u8], issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedSubject, AuthError> {
        let token = bearer_token(headers)?;
        let data = decode::<Claims>(token, &self.key, &self.validation)?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(AuthenticatedSubject(data.claims.sub))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::TokenMissing)?;
    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;

    value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

/// Middleware that attaches an [`AuthenticatedSubject`] when the request carries valid credentials.
pub async fn authenticate(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()) {
        Ok(subject) => {
            request.extensions_mut().insert(subject);
        }
        Err(AuthError::TokenMissing) => {}
        Err(e) => debug!(error = %e, "Request authentication failed"),
    }
    next.run(request).await
}
