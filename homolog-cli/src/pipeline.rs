use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use common_fasta::FastaRecord;
use common_types::{check_dimension, BatchSummary, Fingerprint, HomologBundle, ItemOutcome};
use embedding_client::Embedder;
use sequence_store::SequenceStore;
use vector_index::{SearchParams, VectorIndex};

use crate::error::PipelineError;
use crate::output;

/// The homolog search orchestration: hash, relational short-circuit, embed
/// or fetch, nearest-neighbor search, bundle assembly, per-query output.
/// All collaborators are injected, so this runs unchanged against the real
/// services or the in-memory fakes.
pub struct HomologPipeline {
    store: Arc<dyn SequenceStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    search: SearchParams,
}

impl HomologPipeline {
    pub fn new(
        store: Arc<dyn SequenceStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        search: SearchParams,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            search,
        }
    }

    /// Processes every query sequentially; one query is fully resolved and
    /// written before the next begins. Failures skip the item, never the
    /// batch.
    pub async fn run(&self, records: &[FastaRecord], output_dir: &Path) -> BatchSummary {
        let mut summary = BatchSummary::new();
        for record in records {
            let fingerprint = Fingerprint::of_sequence(&record.sequence);
            match self.process_query(record, output_dir).await {
                Ok(neighbors) => {
                    info!(id = %record.id, %fingerprint, neighbors, "query resolved");
                    summary.push(ItemOutcome::processed(&record.id, fingerprint));
                }
                Err(err) => {
                    if err.is_connectivity() {
                        error!(id = %record.id, %fingerprint, "collaborator unreachable: {err}");
                    } else {
                        error!(id = %record.id, %fingerprint, "query failed: {err}");
                    }
                    summary.push(ItemOutcome::skipped(
                        &record.id,
                        Some(fingerprint),
                        err.to_string(),
                    ));
                }
            }
        }
        summary
    }

    /// One query end to end. Nothing is written unless the whole resolution
    /// succeeded.
    pub async fn process_query(
        &self,
        record: &FastaRecord,
        output_dir: &Path,
    ) -> Result<usize, PipelineError> {
        let bundles = self.resolve(record).await?;
        output::write_query_outputs(output_dir, &record.id, &bundles)?;
        Ok(bundles.len())
    }

    /// Resolves one query to its neighbor bundles without touching disk.
    pub async fn resolve(
        &self,
        record: &FastaRecord,
    ) -> Result<Vec<HomologBundle>, PipelineError> {
        let fingerprint = Fingerprint::of_sequence(&record.sequence);
        let vector = self.query_vector(&fingerprint, &record.sequence).await?;
        check_dimension(&vector)?;

        let neighbors = self.index.search(&vector, self.search).await?;
        let mut bundles = Vec::with_capacity(neighbors.len());
        for neighbor in &neighbors {
            match self.store.bundle(&neighbor.fingerprint).await? {
                Some(bundle) => bundles.push(bundle),
                None => {
                    warn!(
                        fingerprint = %neighbor.fingerprint,
                        "neighbor unknown to the store, emitting a placeholder"
                    );
                    bundles.push(HomologBundle::not_found(&neighbor.fingerprint));
                }
            }
        }
        Ok(bundles)
    }

    /// Stored sequences reuse their indexed vector; everything else goes to
    /// the embedding backend. A stored sequence whose vector is missing or
    /// invalid falls back to the backend too.
    async fn query_vector(
        &self,
        fingerprint: &Fingerprint,
        sequence: &str,
    ) -> Result<Vec<f32>, PipelineError> {
        if self.store.exists(fingerprint).await? {
            if let Some(vector) = self.index.retrieve(fingerprint).await? {
                debug!(%fingerprint, "reusing the stored embedding");
                return Ok(vector);
            }
            info!(%fingerprint, "sequence is stored but has no usable vector, embedding it");
        }
        let embedding = self.embedder.embed(sequence).await?;
        Ok(embedding.pooled())
    }
}
