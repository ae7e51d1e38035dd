
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::config::GeminiConfig;
use crate::http::{JsonClient, parse_json};
use crate::{RagError, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";
const API_VERSION: &str = "v1beta";

/// Client for the Gemini `embedContent` endpoint.
///
/// Every text is embedded with its own request; the batch endpoint is never used.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: JsonClient,
    base_url: Url,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: RequestContent<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestPart<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Option<Vec<f32>>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        Ok(Self {
            http: gemini_http_client(config),
            base_url,
            model: config.embedding_model.clone(),
        })
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate the embedding for a single text
    #[inline]
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let url = model_endpoint(&self.base_url, &self.model, "embedContent")?;
        let request = EmbedRequest {
            model: format!("models/{}", bare_model_name(&self.model)),
            content: RequestContent {
                role: None,
                parts: [RequestPart { text }],
            },
        };

        let response_text = self.http.post_json(&url, &request)?;
        let response: EmbedResponse = parse_json(&response_text, "embedding")?;

        let values = response
            .embedding
            .and_then(|e| e.values)
            .ok_or_else(|| {
                RagError::Protocol("embedding response is missing embedding.values".to_string())
            })?;

        if values.is_empty() {
            return Err(RagError::Protocol(
                "embedding response contained an empty vector".to_string(),
            ));
        }

        debug!("Generated embedding with {} dimensions", values.len());
        Ok(values)
    }

    /// Embed every text in order, one request each.
    ///
    /// The first failure aborts the whole call; no partial results are returned.
    #[inline]
    pub fn embed<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        self.embed_each(texts, |_| {})
    }

    /// Like [`Self::embed`], calling `on_embedded` with the index of each finished text
    #[inline]
    pub fn embed_each<S, F>(&self, texts: &[S], mut on_embedded: F) -> Result<Vec<Vec<f32>>>
    where
        S: AsRef<str>,
        F: FnMut(usize),
    {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let vector = self.embed_one(text.as_ref()).map_err(|e| {
                error!("Embedding text {} of {} failed: {}", index + 1, texts.len(), e);
                e.context(format!(
                    "Failed to embed text {} of {}",
                    index + 1,
                    texts.len()
                ))
            })?;
            vectors.push(vector);
            on_embedded(index);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }
}

/// Build an HTTP client carrying the Gemini API key
pub(crate) fn gemini_http_client(config: &GeminiConfig) -> JsonClient {
    JsonClient::new(Duration::from_secs(config.timeout_seconds))
        .with_header(API_KEY_HEADER, config.api_key.expose())
}

/// `{base}/v1beta/models/{model}:{action}`
pub(crate) fn model_endpoint(base_url: &Url, model: &str, action: &str) -> Result<Url> {
    let target = format!("{}:{}", bare_model_name(model), action);
    api_url(base_url, &["models", &target])
}

/// Append `v1beta/{segments}` to the base URL, keeping any path prefix it carries
pub(crate) fn api_url(base_url: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| RagError::Other(anyhow::anyhow!("Gemini URL cannot be a base: {}", base_url)))?
        .pop_if_empty()
        .push(API_VERSION)
        .extend(segments);
    Ok(url)
}

fn bare_model_name(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}
