//! Key Service - public key directory for secure messaging.
//!
//! Stores one encryption key and one signing key per entity URN and serves
//! them over HTTP. Reads transparently accept documents written by the
//! legacy single-key API, so old entries keep resolving without a migration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod observability;
pub mod service;
pub mod shutdown;
pub mod storage;
pub mod urn;

pub use config::Config;
pub use error::{ErrorCode, ErrorResponse, KeyServiceError};
pub use keys::PublicKeys;
pub use service::{KeyService, ServiceOptions};
pub use storage::{KeyStore, LegacyKeyStore, MemoryKeyStore, StorageError, StorageResult};
pub use urn::{EntityUrn, UrnError};
