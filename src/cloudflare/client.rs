//! Binding for the Browser Rendering `/markdown` endpoint.
//!
//! One call is one `POST {base}/accounts/{account_id}/browser-rendering/markdown`.
//! The client never retries; a [`Error::RateLimit`] carries the server's
//! `Retry-After` so callers can schedule their own retry.
//!
//! ## Outcome mapping
//!
//! | Condition | Outcome |
//! |---|---|
//! | transport timeout | `Failure(Timeout)` |
//! | connect failure | `Failure(Connection)` |
//! | other transport error | `Failure(Network)` |
//! | 2xx with `result` | `Success(result)` |
//! | 2xx without `result` | `Failure(MissingResultKey)` |
//! | 2xx, body not JSON | `Failure(Api)` |
//! | 401 / 404 / 429 / 5xx | `Authentication` / `NotFound` / `RateLimit` / `Server` |
//! | anything else | `Failure(Api)` |

use crate::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
use crate::error::Error;
use crate::outcome::Outcome;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Request body for the `/markdown` endpoint. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkdownRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_timeout_in_milliseconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<u64>,
}

impl MarkdownRequest {
    /// Render the page at `url`.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Render an inline HTML document.
    pub fn for_html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn wait_for_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }

    pub fn wait_for_timeout_ms(mut self, ms: u64) -> Self {
        self.wait_for_timeout_in_milliseconds = Some(ms);
        self
    }

    pub fn cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl = Some(secs);
        self
    }

    /// At least one of `url` or `html` must be set.
    pub fn validate(&self) -> Result<(), Error> {
        if self.url.is_none() && self.html.is_none() {
            return Err(Error::validation("Provide a URL or HTML"));
        }
        Ok(())
    }
}

/// Cloudflare Browser Rendering client.
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    http: reqwest::Client,
    token: String,
    account_id: String,
    base_url: String,
    timeout: Duration,
}

impl CloudflareClient {
    /// Create a client. Both credentials are required and non-empty.
    pub fn new(token: impl Into<String>, account_id: impl Into<String>) -> Result<Self, Error> {
        let token = token.into();
        let account_id = account_id.into();
        if token.is_empty() || account_id.is_empty() {
            return Err(Error::missing_credentials("Missing Cloudflare credentials"));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            token,
            account_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL of the `/markdown` endpoint for this account.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/accounts/{}/browser-rendering/markdown",
            self.base_url.trim_end_matches('/'),
            self.account_id
        )
    }

    /// Render a page (or inline HTML) to Markdown.
    ///
    /// # Errors
    /// `Err(Error::Validation)` when the request has neither `url` nor
    /// `html`; nothing is sent in that case. Every transport and API
    /// outcome is returned as `Ok(Outcome)`.
    pub async fn markdown(&self, request: &MarkdownRequest) -> Result<Outcome<Value>, Error> {
        request.validate()?;

        let endpoint = self.endpoint();
        debug!("POST {} (timeout {:?})", endpoint, self.timeout);

        let sent = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return Ok(Outcome::Failure(transport_error(e))),
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Ok(Outcome::Failure(transport_error(e))),
        };
        debug!("Response {} ({} bytes)", status, body.len());

        Ok(classify(status, body, retry_after).into())
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            source: Arc::new(e),
        }
    } else if e.is_connect() {
        Error::Connection {
            source: Arc::new(e),
        }
    } else {
        Error::Network {
            source: Arc::new(e),
        }
    }
}

/// Map an HTTP status and raw body onto the taxonomy.
///
/// Only 2xx bodies are parsed; error statuses keep whatever body the server
/// sent, JSON or not.
fn classify(status: u16, body: String, retry_after: Option<String>) -> Result<Value, Error> {
    match status {
        200..=299 => {
            let Ok(mut envelope) = serde_json::from_str::<Value>(&body) else {
                return Err(Error::Api {
                    status_code: status,
                    response_body: body,
                });
            };
            match envelope.get_mut("result") {
                Some(result) => Ok(result.take()),
                None => Err(Error::MissingResultKey {
                    status_code: status,
                    response_body: body,
                }),
            }
        }
        401 => Err(Error::Authentication {
            status_code: status,
            response_body: body,
        }),
        404 => Err(Error::NotFound {
            status_code: status,
            response_body: body,
        }),
        429 => Err(Error::RateLimit {
            status_code: status,
            response_body: body,
            retry_after,
        }),
        500..=599 => Err(Error::Server {
            status_code: status,
            response_body: body,
        }),
        _ => Err(Error::Api {
            status_code: status,
            response_body: body,
        }),
    }
}
