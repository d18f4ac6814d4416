use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use common_types::{Fingerprint, EMBEDDING_DIM};

use crate::{IndexError, IndexPoint, PointPayload, ScoredNeighbor, SearchParams, VectorIndex};

/// Client for a Qdrant-compatible REST service. Holds a fixed request
/// timeout; there is no retry, callers log and skip.
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct RetrievedPoint {
    payload: Option<PointPayload>,
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct SearchHit {
    score: f32,
    payload: Option<PointPayload>,
}

impl QdrantIndex {
    pub fn new(
        base_url: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            collection: collection.to_owned(),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn check(response: Response, endpoint: &str) -> Result<Response, IndexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(IndexError::Api {
            status: status.as_u16(),
            endpoint: endpoint.to_owned(),
            message,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self) -> Result<(), IndexError> {
        let endpoint = self.collection_url("");
        let response = self
            .client
            .put(&endpoint)
            .json(&json!({
                "vectors": { "size": EMBEDDING_DIM, "distance": "Cosine" }
            }))
            .send()
            .await?;

        // 409 means the collection is already there, which is what we want
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        Self::check(response, &endpoint).await?;
        Ok(())
    }

    async fn upsert(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
        let endpoint = self.collection_url("/points?wait=true");
        let body = json!({
            "points": points
                .iter()
                .map(|point| {
                    json!({
                        "id": point.fingerprint.point_id().to_string(),
                        "vector": point.vector,
                        "payload": point.payload,
                    })
                })
                .collect::<Vec<_>>()
        });
        let response = self.client.put(&endpoint).json(&body).send().await?;
        Self::check(response, &endpoint).await?;
        Ok(())
    }

    async fn retrieve(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<f32>>, IndexError> {
        let endpoint = self.collection_url("/points");
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({
                "ids": [fingerprint.point_id().to_string()],
                "with_payload": true,
                "with_vector": true,
            }))
            .send()
            .await?;
        let response = Self::check(response, &endpoint).await?;
        let parsed: ApiResponse<Vec<RetrievedPoint>> = response.json().await?;

        let Some(point) = parsed.result.into_iter().next() else {
            return Ok(None);
        };
        let Some(vector) = point.vector else {
            warn!(%fingerprint, "stored point has no vector");
            return Ok(None);
        };
        if vector.len() != EMBEDDING_DIM {
            warn!(
                %fingerprint,
                width = vector.len(),
                "stored vector has the wrong width, ignoring it"
            );
            return Ok(None);
        }
        let payload_matches = point
            .payload
            .and_then(|payload| payload.fingerprint())
            .is_some_and(|stored| stored == *fingerprint);
        if !payload_matches {
            warn!(%fingerprint, "stored payload hash does not match, ignoring the point");
            return Ok(None);
        }
        Ok(Some(vector))
    }

    async fn search(
        &self,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredNeighbor>, IndexError> {
        let endpoint = self.collection_url("/points/search");
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({
                "vector": vector,
                "limit": params.limit,
                "params": { "hnsw_ef": params.hnsw_ef, "exact": params.exact },
                "with_payload": true,
            }))
            .send()
            .await?;
        let response = Self::check(response, &endpoint).await?;
        let parsed: ApiResponse<Vec<SearchHit>> = response.json().await?;

        let mut neighbors = Vec::with_capacity(parsed.result.len());
        for hit in parsed.result {
            let Some(fingerprint) = hit.payload.and_then(|payload| payload.fingerprint()) else {
                warn!(score = hit.score, "search hit without a parsable payload hash, dropping");
                continue;
            };
            neighbors.push(ScoredNeighbor {
                fingerprint,
                score: hit.score,
            });
        }
        neighbors.truncate(params.limit);
        Ok(neighbors)
    }
}
