//! [`VectorIndex`] backed by a Qdrant collection over its REST API.
//!
//! Qdrant only accepts unsigned integers or UUIDs as point ids, so each file
//! path is mapped to a UUIDv5 in the URL namespace. The path itself travels
//! in the payload and is what [`search`](VectorIndex::search) reports back.
//!
//! Every request carries the client timeout configured at construction.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{RecordPayload, VectorHit, VectorIndex};
use crate::error::EngineError;
use crate::models::RemoteStoreParams;

pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

/// Stable point id for a record id.
pub fn point_id(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

impl QdrantIndex {
    /// Connect and make sure `collection` exists with `dims`-sized cosine
    /// vectors, creating it if absent.
    ///
    /// # Errors
    ///
    /// [`EngineError::RemoteStoreInit`] if the service is unreachable, the
    /// collection cannot be created, or it exists with a different vector
    /// size.
    pub async fn connect(
        params: &RemoteStoreParams,
        collection: &str,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = params.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| EngineError::RemoteStoreInit(format!("invalid api key: {}", e)))?;
            headers.insert("api-key", value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EngineError::RemoteStoreInit(e.to_string()))?;

        let index = Self {
            client,
            base_url: params.url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        };
        index.ensure_collection(dims).await?;
        Ok(index)
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn ensure_collection(&self, dims: usize) -> Result<(), EngineError> {
        let init_err = |e: reqwest::Error| EngineError::RemoteStoreInit(e.to_string());

        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(init_err)?;

        match response.status() {
            status if status.is_success() => {
                let body: serde_json::Value = response.json().await.map_err(init_err)?;
                let existing = body
                    .pointer("/result/config/params/vectors/size")
                    .and_then(|v| v.as_u64());
                if let Some(size) = existing {
                    if size as usize != dims {
                        return Err(EngineError::RemoteStoreInit(format!(
                            "collection '{}' has vector size {}, expected {}",
                            self.collection, size, dims
                        )));
                    }
                }
                debug!(collection = %self.collection, "Using existing collection");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                let body = serde_json::json!({
                    "vectors": { "size": dims, "distance": "Cosine" },
                });
                let response = self
                    .client
                    .put(self.collection_url())
                    .json(&body)
                    .send()
                    .await
                    .map_err(init_err)?;
                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(EngineError::RemoteStoreInit(format!(
                        "create collection '{}' failed with {}: {}",
                        self.collection, status, text
                    )));
                }
                info!(collection = %self.collection, dims, "Created collection");
                Ok(())
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(EngineError::RemoteStoreInit(format!(
                    "collection '{}' lookup failed with {}: {}",
                    self.collection, status, text
                )))
            }
        }
    }
}

async fn check(op: &str, response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(EngineError::RemoteStoreOperation(format!(
        "{} failed with {}: {}",
        op, status, text
    )))
}

fn op_err(op: &str) -> impl Fn(reqwest::Error) -> EngineError + '_ {
    move |e| EngineError::RemoteStoreOperation(format!("{}: {}", op, e))
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<RecordPayload>,
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn upsert(
        &self,
        id: &str,
        vector: &[f32],
        payload: &RecordPayload,
    ) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "points": [{
                "id": point_id(id).to_string(),
                "vector": vector,
                "payload": payload,
            }],
        });
        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(op_err("upsert"))?;
        check("upsert", response).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), EngineError> {
        let body = serde_json::json!({ "points": [point_id(id).to_string()] });
        let response = self
            .client
            .post(format!("{}/points/delete?wait=true", self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(op_err("delete"))?;
        check("delete", response).await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Option<Vec<VectorHit>>, EngineError> {
        let body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(op_err("search"))?;
        let parsed: SearchResponse = check("search", response)
            .await?
            .json()
            .await
            .map_err(op_err("search"))?;

        let hits = parsed
            .result
            .into_iter()
            .filter_map(|point| {
                point.payload.map(|p| VectorHit {
                    id: p.path,
                    score: point.score,
                })
            })
            .collect();
        Ok(Some(hits))
    }
}
