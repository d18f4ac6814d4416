use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use common_types::Embedding;

mod rest;

pub use rest::RestEmbedder;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("request to embedding backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("embedding backend produced no embedding")]
    Missing,
}

impl EmbedError {
    pub fn is_connectivity(&self) -> bool {
        match self {
            EmbedError::Request(error) => error.is_connect() || error.is_timeout(),
            _ => false,
        }
    }
}

/// The embedding capability the pipeline consumes. Model loading and
/// inference live elsewhere; all backends look identical through this.
/// Calls are slow (seconds), which is why the store check runs first.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, sequence: &str) -> Result<Embedding, EmbedError>;
}

/// Test double with canned vectors per sequence and a call counter, so tests
/// can assert the relational short-circuit actually skipped the backend.
#[derive(Default)]
pub struct MockEmbedder {
    responses: Mutex<HashMap<String, Embedding>>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, sequence: &str, embedding: Embedding) -> Self {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .insert(sequence.to_owned(), embedding);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, sequence: &str) -> Result<Embedding, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .get(sequence)
            .cloned()
            .ok_or(EmbedError::Missing)
    }
}
