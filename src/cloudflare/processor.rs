//! [`Processor`] backed by the Cloudflare Browser Rendering API.

use super::client::{CloudflareClient, MarkdownRequest};
use crate::config::Config;
use crate::error::{BoxError, Error};
use crate::outcome::Outcome;
use crate::processor::Processor;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

/// Converts URLs by asking Cloudflare to render them.
#[derive(Debug, Clone)]
pub struct CloudflareProcessor {
    client: CloudflareClient,
}

impl CloudflareProcessor {
    /// Build from resolved credentials in `config`.
    ///
    /// Fails with `MissingCredentials` before any network activity when the
    /// token or account id is missing.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = CloudflareClient::new(config.api_token()?, config.account_id()?)?
            .with_timeout_ms(config.timeout_ms)
            .with_base_url(config.base_url.clone());
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: CloudflareClient) -> Self {
        Self { client }
    }

    /// [`crate::processor::ProcessorFactory`] entry point; the default
    /// processor of [`Config`].
    pub fn boxed(config: &Config) -> Result<Box<dyn Processor>, Error> {
        Ok(Box::new(Self::new(config)?))
    }
}

#[async_trait]
impl Processor for CloudflareProcessor {
    async fn convert(&self, url: &str) -> Result<Outcome<Value>, BoxError> {
        validate_url(url)?;
        debug!("Rendering {} via Cloudflare", url);
        Ok(self.client.markdown(&MarkdownRequest::for_url(url)).await?)
    }
}

/// Accept only absolute `http`/`https` URLs with a non-empty host.
pub fn validate_url(url: &str) -> Result<Url, Error> {
    let invalid = || Error::InvalidUrl {
        url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let has_host = parsed.host_str().is_some_and(|h| !h.is_empty());
    match parsed.scheme() {
        "http" | "https" if has_host => Ok(parsed),
        _ => Err(invalid()),
    }
}
