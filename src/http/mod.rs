// Shared blocking HTTP plumbing for the provider clients


use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use ureq::{Agent, RequestBuilder};
use url::Url;

use crate::{RagError, Result};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// JSON-over-HTTP client with a global per-request timeout and fixed auth headers.
///
/// Requests are never retried. Transport failures surface as
/// [`RagError::Connectivity`], non-success statuses as [`RagError::Status`].
#[derive(Clone)]
pub struct JsonClient {
    agent: Agent,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

impl JsonClient {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            headers: Vec::new(),
            timeout,
        }
    }

    /// Attach a header sent with every request, e.g. an API key
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn get(&self, url: &Url) -> Result<String> {
        debug!("GET {}", redact(url));

        let request = self.apply_headers(self.agent.get(url.as_str()));
        let response = request
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string());

        response.map_err(|e| classify_error(e, url))
    }

    #[inline]
    pub fn post_json<B: Serialize + ?Sized>(&self, url: &Url, body: &B) -> Result<String> {
        let request_json = encode_body(body)?;
        debug!("POST {} ({} bytes)", redact(url), request_json.len());

        let request = self
            .apply_headers(self.agent.post(url.as_str()))
            .header("Content-Type", "application/json");
        let response = request
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string());

        response.map_err(|e| classify_error(e, url))
    }

    #[inline]
    pub fn put_json<B: Serialize + ?Sized>(&self, url: &Url, body: &B) -> Result<String> {
        let request_json = encode_body(body)?;
        debug!("PUT {} ({} bytes)", redact(url), request_json.len());

        let request = self
            .apply_headers(self.agent.put(url.as_str()))
            .header("Content-Type", "application/json");
        let response = request
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string());

        response.map_err(|e| classify_error(e, url))
    }

    fn apply_headers<B>(&self, mut request: RequestBuilder<B>) -> RequestBuilder<B> {
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }
}

impl fmt::Debug for JsonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("JsonClient")
            .field("headers", &header_names)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Decode a provider response, treating any shape mismatch as a protocol error
#[inline]
pub fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| RagError::Protocol(format!("Failed to parse {} response: {}", what, e)))
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<String> {
    serde_json::to_string(body)
        .map_err(|e| RagError::Other(anyhow::Error::from(e).context("Failed to serialize request")))
}

fn classify_error(error: ureq::Error, url: &Url) -> RagError {
    let target = redact(url);
    match error {
        ureq::Error::StatusCode(status) => {
            debug!("Request to {} failed with status {}", target, status);
            RagError::Status {
                status,
                message: target,
            }
        }
        ureq::Error::Timeout(_) => {
            RagError::Connectivity(format!("Request to {} timed out", target))
        }
        other => {
            debug!("Request to {} failed with transport error: {}", target, other);
            RagError::Connectivity(format!("Request to {} failed: {}", target, other))
        }
    }
}

/// Render a URL for logs and errors without its query string
fn redact(url: &Url) -> String {
    let mut display = url.clone();
    display.set_query(None);
    display.to_string()
}
