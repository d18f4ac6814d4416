use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use common_types::Fingerprint;

mod memory;
mod qdrant;

pub use memory::{cosine_similarity, MemoryVectorIndex};
pub use qdrant::QdrantIndex;

/// Payload stored next to each vector: a mirror of the fingerprint plus the
/// metadata the upload had on hand. The hash field is what ties a point back
/// to the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    pub hash: String,
}

impl PointPayload {
    pub fn new(fingerprint: &Fingerprint) -> Self {
        Self {
            identifier: None,
            sequence: None,
            hash: fingerprint.to_hex(),
        }
    }

    /// The fingerprint this payload claims to belong to, if its hash parses.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        Fingerprint::from_hex(&self.hash).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub fingerprint: Fingerprint,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl IndexPoint {
    pub fn new(
        fingerprint: Fingerprint,
        vector: Vec<f32>,
        identifier: Option<String>,
        sequence: Option<String>,
    ) -> Self {
        Self {
            fingerprint,
            vector,
            payload: PointPayload {
                identifier,
                sequence,
                hash: fingerprint.to_hex(),
            },
        }
    }
}

/// One search hit, highest similarity first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNeighbor {
    pub fingerprint: Fingerprint,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub limit: usize,
    /// Candidate-list size for the approximate search.
    pub hnsw_ef: usize,
    pub exact: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            limit: 200,
            hnsw_ef: 128,
            exact: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("request to vector index failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("vector index returned {status} for {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },
}

impl IndexError {
    /// True when the index is unreachable, as opposed to rejecting a call.
    pub fn is_connectivity(&self) -> bool {
        match self {
            IndexError::Request(error) => error.is_connect() || error.is_timeout(),
            IndexError::Api { .. } => false,
        }
    }
}

/// The vector-search half of the pipeline. The external service owns the
/// indexing algorithm; this trait is only the client contract, so tests can
/// run against an in-process scan.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection when missing; an existing one is fine.
    async fn ensure_collection(&self) -> Result<(), IndexError>;

    async fn upsert(&self, points: &[IndexPoint]) -> Result<(), IndexError>;

    /// The stored vector for a fingerprint, or None when the point is
    /// missing or fails validation (wrong width, payload hash mismatch).
    async fn retrieve(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<f32>>, IndexError>;

    /// Nearest neighbors, descending by similarity, at most `params.limit`.
    async fn search(
        &self,
        vector: &[f32],
        params: SearchParams,
    ) -> Result<Vec<ScoredNeighbor>, IndexError>;
}
