//! Error types for the edgequake-url2md library.
//!
//! [`Error`] is a closed taxonomy: every failure the library reports maps to
//! exactly one variant, and each variant carries only the context it
//! documents (an HTTP status and raw body for API failures, the transport
//! error for network failures, and so on). The tree of categories that
//! groups them is exposed through [`Error::category`]:
//!
//! ```text
//! Root ─┬─ Configuration ── MissingCredentials
//!       ├─ Network ──────── Timeout, Connection
//!       ├─ Api ──────────── Authentication, NotFound, Server,
//!       │                   MissingResultKey, RateLimit
//!       ├─ Validation ───── InvalidUrl
//!       └─ Cache ────────── CacheRead, CacheWrite
//! ```
//!
//! Two propagation regimes use the same type:
//!
//! * input and credential validation fails immediately with `Err(Error)`;
//! * network and API outcomes come back as
//!   [`Outcome::Failure`](crate::outcome::Outcome::Failure).
//!
//! [`crate::convert::Converter`] is the one place where the first regime is
//! folded into the second.

use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Shared handle to the original error behind a taxonomy variant.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Any error a [`crate::processor::Processor`] may raise.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors reported by the edgequake-url2md library.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Root ──────────────────────────────────────────────────────────────
    /// A failure outside the taxonomy, wrapped with its original cause.
    #[error("{message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    // ── Configuration ─────────────────────────────────────────────────────
    /// A configuration value is unusable.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// The API token or account id is missing.
    #[error("{message}")]
    MissingCredentials { message: String },

    // ── Network ───────────────────────────────────────────────────────────
    /// Transport failure that is neither a timeout nor a connect failure.
    #[error("Network error: {source}")]
    Network {
        #[source]
        source: Cause,
    },

    /// The request exceeded the configured timeout.
    #[error("Request timed out: {source}")]
    Timeout {
        #[source]
        source: Cause,
    },

    /// The remote host could not be reached.
    #[error("Connection failed: {source}")]
    Connection {
        #[source]
        source: Cause,
    },

    // ── API ───────────────────────────────────────────────────────────────
    /// Unclassified API failure, or a body that is not valid JSON.
    #[error("API request failed with status {status_code}")]
    Api {
        status_code: u16,
        response_body: String,
    },

    /// HTTP 401: the token was rejected.
    #[error("Authentication failed (status {status_code})")]
    Authentication {
        status_code: u16,
        response_body: String,
    },

    /// HTTP 404.
    #[error("Resource not found (status {status_code})")]
    NotFound {
        status_code: u16,
        response_body: String,
    },

    /// HTTP 5xx.
    #[error("Server error (status {status_code})")]
    Server {
        status_code: u16,
        response_body: String,
    },

    /// A 2xx response whose JSON envelope has no `result` key.
    #[error("Response with status {status_code} has no `result` key")]
    MissingResultKey {
        status_code: u16,
        response_body: String,
    },

    /// HTTP 429. `retry_after` is the raw `Retry-After` header, if any.
    #[error("Rate limit exceeded (status {status_code}){}", retry_hint(.retry_after))]
    RateLimit {
        status_code: u16,
        response_body: String,
        retry_after: Option<String>,
    },

    // ── Validation ────────────────────────────────────────────────────────
    /// Caller input is unusable.
    #[error("{message}")]
    Validation { message: String },

    /// Not an absolute HTTP/HTTPS URL with a host.
    #[error("Invalid URL '{url}'")]
    InvalidUrl { url: String },

    // ── Cache ─────────────────────────────────────────────────────────────
    /// The cache could not be read, or the key is absent.
    #[error("Cache read failed: {message}")]
    CacheRead {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// The cache could not be written.
    #[error("Cache write failed: {message}")]
    CacheWrite {
        message: String,
        #[source]
        source: Option<Cause>,
    },
}

/// The branch of the taxonomy an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Root,
    Configuration,
    Network,
    Api,
    Validation,
    Cache,
}

fn retry_hint(retry_after: &Option<String>) -> String {
    match retry_after {
        Some(value) => format!(", retry after {value}"),
        None => String::new(),
    }
}

impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Error::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    pub fn missing_credentials(message: impl Into<String>) -> Self {
        Error::MissingCredentials {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Fold an arbitrary raised error into the taxonomy.
    ///
    /// Taxonomy members are returned unchanged; anything else becomes
    /// [`Error::Unexpected`] with the original kept as its source.
    pub fn from_raised(raised: BoxError) -> Self {
        match raised.downcast::<Error>() {
            Ok(error) => *error,
            Err(other) => Error::Unexpected {
                message: other.to_string(),
                source: Some(Arc::from(other)),
            },
        }
    }

    /// Fold a caught panic payload into [`Error::Unexpected`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Error::unexpected(format!("Conversion panicked: {detail}"))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Unexpected { .. } => ErrorCategory::Root,
            Error::Configuration { .. } | Error::MissingCredentials { .. } => {
                ErrorCategory::Configuration
            }
            Error::Network { .. } | Error::Timeout { .. } | Error::Connection { .. } => {
                ErrorCategory::Network
            }
            Error::Api { .. }
            | Error::Authentication { .. }
            | Error::NotFound { .. }
            | Error::Server { .. }
            | Error::MissingResultKey { .. }
            | Error::RateLimit { .. } => ErrorCategory::Api,
            Error::Validation { .. } | Error::InvalidUrl { .. } => ErrorCategory::Validation,
            Error::CacheRead { .. } | Error::CacheWrite { .. } => ErrorCategory::Cache,
        }
    }

    /// HTTP status of an API failure.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. }
            | Error::Authentication { status_code, .. }
            | Error::NotFound { status_code, .. }
            | Error::Server { status_code, .. }
            | Error::MissingResultKey { status_code, .. }
            | Error::RateLimit { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Raw response body of an API failure.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::Api { response_body, .. }
            | Error::Authentication { response_body, .. }
            | Error::NotFound { response_body, .. }
            | Error::Server { response_body, .. }
            | Error::MissingResultKey { response_body, .. }
            | Error::RateLimit { response_body, .. } => Some(response_body),
            _ => None,
        }
    }

    /// The `Retry-After` header of a rate-limit failure.
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Error::RateLimit { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }

    /// Whether a later identical request could succeed.
    ///
    /// The client never retries on its own; this is a hint for callers that
    /// implement their own policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Connection { .. }
                | Error::RateLimit { .. }
                | Error::Server { .. }
        )
    }
}
