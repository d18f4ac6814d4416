use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

use common_types::{Embedding, EmbeddingModel};

use crate::{EmbedError, Embedder};

/// Client for the local inference service that owns the model files. The
/// model variant, GPU flag, and model directory travel with every request;
/// the service decides what loading them means.
pub struct RestEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: EmbeddingModel,
    use_gpu: bool,
    model_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    sequence: &'a str,
    model: EmbeddingModel,
    use_gpu: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_dir: Option<&'a Path>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

impl RestEmbedder {
    pub fn new(
        base_url: &str,
        model: EmbeddingModel,
        use_gpu: bool,
        model_dir: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            use_gpu,
            model_dir,
        })
    }

    pub fn model(&self) -> EmbeddingModel {
        self.model
    }
}

#[async_trait]
impl Embedder for RestEmbedder {
    async fn embed(&self, sequence: &str) -> Result<Embedding, EmbedError> {
        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest {
                sequence,
                model: self.model,
                use_gpu: self.use_gpu,
                model_dir: self.model_dir.as_deref(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(
                model = %self.model,
                %status,
                "embedding backend rejected the request: {message}"
            );
            return Err(EmbedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embedding.dimension() == 0 {
            return Err(EmbedError::Missing);
        }
        Ok(parsed.embedding)
    }
}
