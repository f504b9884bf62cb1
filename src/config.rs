//! Configuration for URL-to-Markdown conversion.
//!
//! All settings live in one explicit [`Config`] value, built once at start-up
//! (via [`Config::from_env`] or [`Config::builder`]) and passed by reference
//! to whatever needs it. There is no process-wide singleton.

use crate::cloudflare::CloudflareProcessor;
use crate::error::Error;
use crate::processor::ProcessorFactory;
use std::fmt;
use std::sync::Arc;

/// Environment variable holding the Cloudflare API token.
pub const API_TOKEN_ENV: &str = "CLOUDFLARE_API_TOKEN";
/// Environment variable holding the Cloudflare account id.
pub const ACCOUNT_ID_ENV: &str = "CLOUDFLARE_ACCOUNT_ID";

/// Default Cloudflare API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL: u64 = 5;

/// Settings shared by the converter, processors, and client.
///
/// # Example
/// ```rust
/// use edgequake_url2md::Config;
///
/// let config = Config::builder()
///     .api_token("token")
///     .account_id("account")
///     .timeout_ms(10_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_token().unwrap(), "token");
/// ```
#[derive(Clone)]
pub struct Config {
    /// Bearer token for the Cloudflare API.
    pub api_token: Option<String>,

    /// Cloudflare account identifier, part of the endpoint path.
    pub account_id: Option<String>,

    /// Timeout for one rendering request, in milliseconds. Default: 30 000.
    pub timeout_ms: u64,

    /// Cache TTL in seconds. Default: 5.
    ///
    /// Reserved: the bundled cache stores do not expire entries.
    pub cache_ttl: u64,

    /// API base URL. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Builds the processor used when a [`crate::Converter`] is not given one.
    /// Default: [`CloudflareProcessor`].
    pub default_processor: Arc<dyn ProcessorFactory>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            account_id: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cache_ttl: DEFAULT_CACHE_TTL,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_processor: Arc::new(CloudflareProcessor::boxed),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("account_id", &self.account_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("cache_ttl", &self.cache_ttl)
            .field("base_url", &self.base_url)
            .field("default_processor", &"<dyn ProcessorFactory>")
            .finish()
    }
}

impl Config {
    /// Create a new builder for `Config`.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults, with credentials read from [`API_TOKEN_ENV`] and
    /// [`ACCOUNT_ID_ENV`].
    pub fn from_env() -> Self {
        Self {
            api_token: std::env::var(API_TOKEN_ENV).ok(),
            account_id: std::env::var(ACCOUNT_ID_ENV).ok(),
            ..Self::default()
        }
    }

    /// The API token, or `MissingCredentials` if it is unset or empty.
    pub fn api_token(&self) -> Result<&str, Error> {
        non_empty(self.api_token.as_deref())
            .ok_or_else(|| Error::missing_credentials("Missing Cloudflare API token"))
    }

    /// The account id, or `MissingCredentials` if it is unset or empty.
    pub fn account_id(&self) -> Result<&str, Error> {
        non_empty(self.account_id.as_deref())
            .ok_or_else(|| Error::missing_credentials("Missing Cloudflare account ID"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = Some(token.into());
        self
    }

    pub fn account_id(mut self, id: impl Into<String>) -> Self {
        self.config.account_id = Some(id.into());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn cache_ttl(mut self, secs: u64) -> Self {
        self.config.cache_ttl = secs;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn default_processor(mut self, factory: Arc<dyn ProcessorFactory>) -> Self {
        self.config.default_processor = factory;
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Credentials are not checked here: they are resolved when a processor
    /// is built, so a conversion without them reports `MissingCredentials`.
    pub fn build(self) -> Result<Config, Error> {
        let c = &self.config;
        if c.timeout_ms == 0 {
            return Err(Error::Configuration {
                message: "timeout_ms must be ≥ 1".into(),
            });
        }
        if c.base_url.trim().is_empty() {
            return Err(Error::Configuration {
                message: "base_url must not be empty".into(),
            });
        }
        Ok(self.config)
    }
}
