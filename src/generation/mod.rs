// Answer generation module
// Prompts a Gemini model with retrieved context and turns failures into a fallback answer


use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GeminiConfig;
use crate::embeddings::gemini::{
    RequestContent, RequestPart, api_url, gemini_http_client, model_endpoint,
};
use crate::http::{JsonClient, parse_json};
use crate::{RagError, Result};

pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// Shown in place of an answer when generation fails
pub const FALLBACK_ANSWER: &str = "Sorry, the request could not be processed.";

/// Outcome of a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Generated(String),
    /// Generation failed; carries the reason for logs, never shown to the user
    Unavailable(String),
}

impl Answer {
    /// The text to show the user
    #[inline]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::Unavailable(_) => FALLBACK_ANSWER,
        }
    }

    #[inline]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

#[derive(Debug, Clone)]
pub struct AnswerGenerator {
    http: JsonClient,
    base_url: Url,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

/// Lay out context and question under fixed labels, ending with an answer cue
#[inline]
pub fn build_prompt(query: &str, context: &str) -> String {
    format!("Context:\n{context}\n\nQuestion:\n{query}\n\nAnswer:")
}

impl AnswerGenerator {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        Ok(Self {
            http: gemini_http_client(config),
            base_url,
            model: config.generation_model.clone(),
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

    /// Check the provider is reachable by listing its models
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check against {}", self.base_url);

        let models = self
            .list_models()
            .map_err(|e| e.context("Generation provider health check failed"))?;

        let wanted = format!("models/{}", self.model.trim_start_matches("models/"));
        if models.iter().any(|m| m.name == wanted) {
            debug!("Model {} is available", self.model);
        } else {
            warn!(
                "Model {} not found among {} listed models",
                self.model,
                models.len()
            );
        }

        info!("Health check passed for {}", self.base_url);
        Ok(())
    }

    /// List the models the API key can see, following `nextPageToken` across pages
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let base = api_url(&self.base_url, &["models"])?;
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = base.clone();
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let response_text = self.http.get(&url)?;
            let response: ModelsResponse = parse_json(&response_text, "models")?;
            models.extend(response.models);

            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page_token.as_ref() != Some(&token) => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Found {} models", models.len());
        Ok(models)
    }

    /// Answer `query` from `context`; failures become [`Answer::Unavailable`]
    #[inline]
    pub fn generate(&self, query: &str, context: &str) -> Answer {
        match self.try_generate(query, context) {
            Ok(text) => Answer::Generated(text),
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                Answer::Unavailable(e.to_string())
            }
        }
    }

    /// Send one generation request and extract the first candidate's text
    #[inline]
    pub fn try_generate(&self, query: &str, context: &str) -> Result<String> {
        let prompt = build_prompt(query, context);
        debug!("Generating answer (prompt length: {})", prompt.len());

        let url = model_endpoint(&self.base_url, &self.model, "generateContent")?;
        let request = GenerateRequest {
            contents: [RequestContent {
                role: Some("user"),
                parts: [RequestPart { text: &prompt }],
            }],
        };

        let response_text = self.http.post_json(&url, &request)?;
        let response: GenerateResponse = parse_json(&response_text, "generation")?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| {
                RagError::Protocol(
                    "generation response is missing candidates[0].content.parts[0].text"
                        .to_string(),
                )
            })
    }
}
