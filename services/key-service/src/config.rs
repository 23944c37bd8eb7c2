//! Two-stage configuration
//!
//! Stage 1 reads the YAML file into [`FileConfig`]. Stage 2 applies
//! environment overrides and validates, producing the runtime [`Config`].
//! Overrides are read through a lookup function so tests can supply their own
//! environment.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ::config::{File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Config file used when `KEY_SERVICE_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config/local.yaml";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// YAML file could not be read or deserialized
    #[error("Failed to load config file: {0}")]
    File(#[from] ::config::ConfigError),

    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Setting that held the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Listen address is not `host:port`
    #[error("Invalid listen address: {0}")]
    InvalidListenAddr(String),

    /// Invalid timeout value
    #[error("Invalid timeout for {0}: must be greater than 0")]
    InvalidTimeout(&'static str),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Developer machine: human-readable logs
    #[default]
    Local,
    /// Deployed: JSON logs
    Production,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}

/// Which [`KeyStore`](crate::storage::KeyStore) implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map; contents are lost on restart
    #[default]
    Memory,
    /// Redis document store
    Redis,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// `storage` section of the YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend kind
    pub backend: StorageBackend,
    /// Collection holding key documents
    pub collection: String,
    /// Redis URL, required for the redis backend
    pub redis_url: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            collection: "public-keys".to_string(),
            redis_url: None,
        }
    }
}

/// `cors` section of the YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsSection {
    /// Origins allowed to call the API
    pub allowed_origins: Vec<String>,
}

/// Stage 1: the YAML file as written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Deployment mode
    pub run_mode: RunMode,
    /// Project namespace for stored documents
    pub project_id: String,
    /// Listen address; `:8081` binds every interface
    pub http_listen_addr: String,
    /// Token issuer
    pub identity_service_url: Option<String>,
    /// Storage settings
    pub storage: StorageSection,
    /// CORS settings
    pub cors: CorsSection,
    /// Per-request storage deadline in seconds
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown, in seconds
    pub shutdown_timeout_secs: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Local,
            project_id: String::new(),
            http_listen_addr: ":8081".to_string(),
            identity_service_url: None,
            storage: StorageSection::default(),
            cors: CorsSection::default(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Runtime storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend kind
    pub backend: StorageBackend,
    /// Collection holding key documents
    pub collection: String,
    /// Redis URL; always set for the redis backend
    pub redis_url: Option<String>,
}

/// Stage 2: validated runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Deployment mode
    pub run_mode: RunMode,
    /// Project namespace for stored documents
    pub project_id: String,
    /// Normalized `host:port` to bind
    pub listen_addr: String,
    /// Expected token issuer, if any
    pub identity_service_url: Option<Url>,
    /// Storage settings
    pub storage: StorageConfig,
    /// Origins allowed by CORS
    pub cors_allowed_origins: Vec<String>,
    /// Per-request storage deadline
    pub request_timeout: Duration,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout: Duration,
    /// HS256 secret for bearer tokens (environment only)
    pub jwt_secret: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("run_mode", &self.run_mode)
            .field("project_id", &self.project_id)
            .field("listen_addr", &self.listen_addr)
            .field("identity_service_url", &self.identity_service_url)
            .field("storage", &self.storage)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("jwt_secret", &"[REDACTED]")
            .finish()
    }
}

impl FileConfig {
    /// Parses YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config = ::config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Reads a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading config file");
        let config = ::config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Applies environment overrides and validates.
    ///
    /// `lookup` returns the value of an environment variable; empty values
    /// count as unset. `JWT_SECRET` is only ever read from the environment.
    pub fn apply_env_overrides<F>(self, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            let value = lookup(name).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                debug!(key = name, source = "env", "Overriding config value");
            }
            value
        };

        let run_mode = parse_override(&lookup, "RUN_MODE", self.run_mode)?;
        let project_id = lookup("PROJECT_ID").unwrap_or(self.project_id);
        let http_listen_addr = lookup("HTTP_LISTEN_ADDR").unwrap_or(self.http_listen_addr);
        let identity_service_url =
            lookup("IDENTITY_SERVICE_URL").or(self.identity_service_url);
        let backend = parse_override(&lookup, "STORAGE_BACKEND", self.storage.backend)?;
        let collection = lookup("KEY_COLLECTION").unwrap_or(self.storage.collection);
        let redis_url = lookup("REDIS_URL").or(self.storage.redis_url);
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or(self.cors.allowed_origins);
        let request_timeout_secs =
            parse_override(&lookup, "REQUEST_TIMEOUT", self.request_timeout_secs)?;
        let shutdown_timeout_secs =
            parse_override(&lookup, "SHUTDOWN_TIMEOUT", self.shutdown_timeout_secs)?;

        let config = Config {
            run_mode,
            project_id,
            listen_addr: normalize_listen_addr(&http_listen_addr)?,
            identity_service_url: identity_service_url
                .map(|url| parse_url("identity_service_url", &url))
                .transpose()?,
            storage: StorageConfig {
                backend,
                collection,
                redis_url,
            },
            cors_allowed_origins,
            request_timeout: Duration::from_secs(request_timeout_secs),
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
            jwt_secret: lookup("JWT_SECRET").unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Loads the YAML file named by `KEY_SERVICE_CONFIG` and applies the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = env::var("KEY_SERVICE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        FileConfig::load(Path::new(&path))?.apply_env_overrides(|name| env::var(name).ok())
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.storage.collection.is_empty() {
            return Err(ConfigError::MissingRequired("storage.collection".to_string()));
        }
        if self.storage.backend == StorageBackend::Redis && self.storage.redis_url.is_none() {
            return Err(ConfigError::MissingRequired("storage.redis_url".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("request_timeout"));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("shutdown_timeout"));
        }
        Ok(())
    }

    /// Expected token issuer, without the trailing slash URL normalization adds.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.identity_service_url
            .as_ref()
            .map(|url| url.as_str().trim_end_matches('/'))
    }
}

/// Parse an override with the current value as default.
fn parse_override<T, F>(lookup: &F, name: &str, current: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(current),
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a comma-separated list.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accepts `host:port` or `:port`; the latter binds every interface.
fn normalize_listen_addr(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidListenAddr(raw.to_string()))?;

    let port: u16 = port
        .parse()
        .map_err(|_| ConfigError::InvalidListenAddr(raw.to_string()))?;

    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Ok(format!("{host}:{port}"))
}
