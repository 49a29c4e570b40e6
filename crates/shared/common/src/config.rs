//! Connection configuration loaded from environment variables.
//!
//! Validation runs once and reports every violation it finds, not just the
//! first one.

use std::borrow::Cow;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::constants::{
    AUTOSCALE_THROUGHPUT_STEP, DEFAULT_DATABASE_NAME, DEFAULT_ENDPOINT,
    DEFAULT_MAX_CONNECTIONS_PER_ENDPOINT, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECONDS,
    DEFAULT_RETRY_ATTEMPTS,
};
use crate::error::{AppError, AppResult};

pub const ENV_ENDPOINT: &str = "DOCSTORE_ENDPOINT";
pub const ENV_KEY: &str = "DOCSTORE_KEY";
pub const ENV_DATABASE: &str = "DOCSTORE_DATABASE";
pub const ENV_PAGE_SIZE: &str = "DOCSTORE_PAGE_SIZE";
pub const ENV_RETRY_ATTEMPTS: &str = "DOCSTORE_RETRY_ATTEMPTS";
pub const ENV_REQUEST_TIMEOUT_SECONDS: &str = "DOCSTORE_REQUEST_TIMEOUT_SECONDS";
pub const ENV_CONNECTION_MODE: &str = "DOCSTORE_CONNECTION_MODE";
pub const ENV_MAX_CONNECTIONS: &str = "DOCSTORE_MAX_CONNECTIONS";
pub const ENV_AUTOSCALE_MAX_THROUGHPUT: &str = "DOCSTORE_AUTOSCALE_MAX_THROUGHPUT";

/// How the client talks to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Direct TCP connections to replicas
    #[default]
    Direct,
    /// HTTPS through the gateway
    Gateway,
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(ConnectionMode::Direct),
            "gateway" => Ok(ConnectionMode::Gateway),
            other => Err(format!("unknown connection mode '{}'", other)),
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Direct => write!(f, "direct"),
            ConnectionMode::Gateway => write!(f, "gateway"),
        }
    }
}

/// Document store connection configuration
#[derive(Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_autoscale", skip_on_field_errors = false))]
pub struct ConnectionConfig {
    #[validate(url(message = "endpoint must be a valid URL"))]
    pub endpoint: String,

    #[serde(default, skip_serializing)]
    #[validate(length(min = 1, message = "account key must be set"))]
    key: String,

    #[validate(length(min = 1, message = "database name must be set"))]
    pub database_name: String,

    #[validate(range(min = 1, max = 1000, message = "default page size must be between 1 and 1000"))]
    pub default_page_size: u32,

    #[validate(range(max = 10, message = "retry attempts must be at most 10"))]
    pub retry_attempts: u32,

    #[validate(range(min = 1, max = 300, message = "request timeout must be between 1 and 300 seconds"))]
    pub request_timeout_seconds: u64,

    pub connection_mode: ConnectionMode,

    #[validate(range(min = 1, max = 1000, message = "max connections per endpoint must be between 1 and 1000"))]
    pub max_connections_per_endpoint: u32,

    /// Autoscale throughput ceiling applied when provisioning the database
    pub autoscale_max_throughput: Option<u32>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &"[REDACTED]")
            .field("database_name", &self.database_name)
            .field("default_page_size", &self.default_page_size)
            .field("retry_attempts", &self.retry_attempts)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("connection_mode", &self.connection_mode)
            .field("max_connections_per_endpoint", &self.max_connections_per_endpoint)
            .field("autoscale_max_throughput", &self.autoscale_max_throughput)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key: String::new(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            connection_mode: ConnectionMode::default(),
            max_connections_per_endpoint: DEFAULT_MAX_CONNECTIONS_PER_ENDPOINT,
            autoscale_max_throughput: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration with defaults for everything but the account.
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Replace the account key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Account key for request signing.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Validate every field, reporting all violations at once.
    pub fn validate_all(&self) -> AppResult<()> {
        self.validate()
            .map_err(|errors| AppError::Configuration(collect_violations(&errors)))
    }

    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparseable values are reported alongside validation failures.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut violations = Vec::new();
        let defaults = Self::default();

        let config = Self {
            endpoint: lookup(ENV_ENDPOINT).unwrap_or(defaults.endpoint),
            key: lookup(ENV_KEY).unwrap_or_default(),
            database_name: lookup(ENV_DATABASE).unwrap_or(defaults.database_name),
            default_page_size: parse_var(&lookup, ENV_PAGE_SIZE, &mut violations)
                .unwrap_or(defaults.default_page_size),
            retry_attempts: parse_var(&lookup, ENV_RETRY_ATTEMPTS, &mut violations)
                .unwrap_or(defaults.retry_attempts),
            request_timeout_seconds: parse_var(&lookup, ENV_REQUEST_TIMEOUT_SECONDS, &mut violations)
                .unwrap_or(defaults.request_timeout_seconds),
            connection_mode: parse_var(&lookup, ENV_CONNECTION_MODE, &mut violations)
                .unwrap_or(defaults.connection_mode),
            max_connections_per_endpoint: parse_var(&lookup, ENV_MAX_CONNECTIONS, &mut violations)
                .unwrap_or(defaults.max_connections_per_endpoint),
            autoscale_max_throughput: parse_var(&lookup, ENV_AUTOSCALE_MAX_THROUGHPUT, &mut violations),
        };

        if let Err(errors) = config.validate() {
            violations.extend(collect_violations(&errors));
        }

        if violations.is_empty() {
            Ok(config)
        } else {
            violations.sort();
            Err(AppError::Configuration(violations))
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, violations: &mut Vec<String>) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            violations.push(format!("{}: cannot parse '{}': {}", name, raw, e));
            None
        }
    }
}

fn validate_autoscale(config: &ConnectionConfig) -> Result<(), ValidationError> {
    match config.autoscale_max_throughput {
        Some(ceiling) if ceiling < AUTOSCALE_THROUGHPUT_STEP || ceiling % AUTOSCALE_THROUGHPUT_STEP != 0 => {
            let mut error = ValidationError::new("autoscale_max_throughput");
            error.message = Some(Cow::from(format!(
                "autoscale max throughput must be a multiple of {} and at least {}",
                AUTOSCALE_THROUGHPUT_STEP, AUTOSCALE_THROUGHPUT_STEP
            )));
            Err(error)
        }
        _ => Ok(()),
    }
}

fn collect_violations(errors: &ValidationErrors) -> Vec<String> {
    let mut violations: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = field.to_string();
            errs.iter().map(move |error| {
                let detail = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                if field == "__all__" {
                    detail
                } else {
                    format!("{}: {}", field, detail)
                }
            })
        })
        .collect();
    violations.sort();
    violations
}
