#[cfg(test)]
mod tests;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::config::QdrantConfig;
use crate::http::{JsonClient, parse_json};
use crate::{RagError, Result};

/// Separator placed between retrieved chunk texts when building a context
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const API_KEY_HEADER: &str = "api-key";
const HTTP_CONFLICT: u16 = 409;

/// Similarity metric of a collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    #[default]
    Cosine,
}

/// A vector with its id and text payload, as stored in a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
}

impl IndexedPoint {
    #[inline]
    pub fn new(id: u64, vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            id,
            vector,
            payload: PointPayload { text: text.into() },
        }
    }
}

/// Qdrant point ids are either unsigned integers or UUID strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(id) => write!(f, "{id}"),
            Self::Uuid(id) => f.write_str(id),
        }
    }
}

/// A search result; the stored vector is never returned
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: PointId,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: Distance,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    points: &'a [IndexedPoint],
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    result: Option<UpdateResult>,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Option<Vec<ScoredPoint>>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    payload: Option<PointPayload>,
}

/// Client for a single Qdrant collection
#[derive(Debug, Clone)]
pub struct VectorStoreClient {
    http: JsonClient,
    base_url: Url,
    collection: String,
}

impl VectorStoreClient {
    #[inline]
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let http = JsonClient::new(Duration::from_secs(config.timeout_seconds))
            .with_header(API_KEY_HEADER, config.api_key.expose());

        Ok(Self {
            http,
            base_url,
            collection: config.collection.clone(),
        })
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection, treating "already exists" as success.
    ///
    /// Returns `true` if the collection was created by this call.
    #[inline]
    pub fn ensure_collection(&self, dimension: usize, distance: Distance) -> Result<bool> {
        let url = self.collection_url(&[])?;
        let request = CreateCollectionRequest {
            vectors: VectorParams {
                size: dimension,
                distance,
            },
        };

        debug!(
            "Ensuring collection '{}' ({} dimensions, {:?})",
            self.collection, dimension, distance
        );

        match self.http.put_json(&url, &request) {
            Ok(_) => {
                info!("Created collection '{}'", self.collection);
                Ok(true)
            }
            Err(e) if e.status() == Some(HTTP_CONFLICT) => {
                debug!("Collection '{}' already exists", self.collection);
                Ok(false)
            }
            Err(e) => {
                error!("Failed to create collection '{}': {}", self.collection, e);
                Err(e.context(format!("Failed to create collection '{}'", self.collection)))
            }
        }
    }

    /// Write all points in a single request, overwriting existing ids
    #[inline]
    pub fn upsert(&self, points: &[IndexedPoint]) -> Result<()> {
        if points.is_empty() {
            debug!("No points to upsert");
            return Ok(());
        }

        let mut url = self.collection_url(&["points"])?;
        url.query_pairs_mut().append_pair("wait", "true");

        let failure_context = || {
            format!(
                "Failed to upsert {} points into '{}'",
                points.len(),
                self.collection
            )
        };

        let response_text = self
            .http
            .put_json(&url, &UpsertRequest { points })
            .map_err(|e| {
                error!("{}: {}", failure_context(), e);
                e.context(failure_context())
            })?;

        let response: UpsertResponse =
            parse_json(&response_text, "upsert").map_err(|e| e.context(failure_context()))?;
        let result = response.result.ok_or_else(|| {
            RagError::Protocol(format!("{}: response is missing result", failure_context()))
        })?;

        info!(
            "Upserted {} points into '{}' (status: {})",
            points.len(),
            self.collection,
            result.status
        );
        Ok(())
    }

    /// Return the `top_k` nearest points by the collection's similarity metric
    #[inline]
    pub fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let url = self.collection_url(&["points", "search"])?;
        let request = SearchRequest {
            vector,
            limit: top_k,
            with_payload: true,
            with_vector: false,
        };

        let response_text = self.http.post_json(&url, &request)?;
        let response: SearchResponse = parse_json(&response_text, "search")?;

        let points = response.result.ok_or_else(|| {
            RagError::Protocol("search response is missing result".to_string())
        })?;

        let hits = points
            .into_iter()
            .map(|point| -> Result<SearchHit> {
                let payload = point.payload.ok_or_else(|| {
                    RagError::Protocol(format!("search hit {} has no payload", point.id))
                })?;
                Ok(SearchHit {
                    id: point.id,
                    score: point.score,
                    text: payload.text,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Search returned {} hits (scores: {})",
            hits.len(),
            hits.iter().map(|h| format!("{:.3}", h.score)).join(", ")
        );

        Ok(hits)
    }

    fn collection_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RagError::Other(anyhow::anyhow!(
                    "Qdrant URL cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push("collections")
            .push(&self.collection)
            .extend(segments);
        Ok(url)
    }
}

/// Join hit texts in rank order into a single context string
#[inline]
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter().map(|hit| hit.text.as_str()).join(CONTEXT_SEPARATOR)
}
