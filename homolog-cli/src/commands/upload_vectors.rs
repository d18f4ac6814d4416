use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use common_arrayfile::NamedArray;
use common_fasta::{FastaRecord, HeaderFormat};
use common_types::{check_dimension, BatchSummary, Fingerprint, ItemOutcome};
use vector_index::{IndexPoint, QdrantIndex, VectorIndex};

use crate::config::Config;
use crate::error::PipelineError;

pub async fn run(
    config: &Config,
    fasta: &Path,
    vectors: &Path,
    header_format: &str,
) -> Result<()> {
    let header_format: HeaderFormat = header_format.parse()?;
    let records = common_fasta::read_fasta(fasta).map_err(PipelineError::Parse)?;
    let arrays = common_arrayfile::read_named_arrays(vectors).map_err(PipelineError::ArrayFile)?;
    let index = QdrantIndex::new(
        &config.index_url,
        &config.index_collection,
        Duration::from_secs(config.index_timeout_secs),
    )
    .context("failed to build the vector index client")?;

    let summary = upload(
        &index,
        &records,
        &arrays,
        header_format,
        config.upsert_batch_size,
    )
    .await?;
    println!("{summary}");
    Ok(())
}

/// Pairs each named array with its sequence by identifier, hashes the
/// sequence, and upserts points in batches. Per-residue matrices are
/// mean-pooled first; wrong-width vectors and unknown identifiers are
/// skipped. A failed batch skips its points and the upload continues.
pub async fn upload(
    index: &dyn VectorIndex,
    records: &[FastaRecord],
    arrays: &[NamedArray],
    header_format: HeaderFormat,
    batch_size: usize,
) -> Result<BatchSummary, PipelineError> {
    index.ensure_collection().await?;

    let sequences_by_identifier: HashMap<String, &str> = records
        .iter()
        .filter_map(|record| {
            header_format
                .identifier(&record.id)
                .map(|identifier| (identifier, record.sequence.as_str()))
        })
        .collect();

    let mut summary = BatchSummary::new();
    let mut batch: Vec<IndexPoint> = Vec::with_capacity(batch_size);

    for array in arrays {
        let Some(sequence) = sequences_by_identifier.get(&array.name) else {
            warn!(identifier = %array.name, "no sequence for this identifier, skipping");
            summary.push(ItemOutcome::skipped(
                &array.name,
                None,
                "no sequence for this identifier",
            ));
            continue;
        };
        let vector = if array.is_matrix() {
            common_types::mean_pool(&array.rows())
        } else {
            array.data.clone()
        };
        let fingerprint = Fingerprint::of_sequence(sequence);
        if let Err(err) = check_dimension(&vector) {
            error!(identifier = %array.name, %fingerprint, "{err}");
            summary.push(ItemOutcome::skipped(
                &array.name,
                Some(fingerprint),
                err.to_string(),
            ));
            continue;
        }
        batch.push(IndexPoint::new(
            fingerprint,
            vector,
            Some(array.name.clone()),
            Some((*sequence).to_owned()),
        ));
        if batch.len() == batch_size {
            flush(index, &mut batch, &mut summary).await;
        }
    }
    if !batch.is_empty() {
        flush(index, &mut batch, &mut summary).await;
    }
    Ok(summary)
}

async fn flush(index: &dyn VectorIndex, batch: &mut Vec<IndexPoint>, summary: &mut BatchSummary) {
    match index.upsert(batch).await {
        Ok(()) => {
            info!(points = batch.len(), "inserted batch");
            for point in batch.drain(..) {
                let identifier = point
                    .payload
                    .identifier
                    .unwrap_or_else(|| point.fingerprint.to_hex());
                summary.push(ItemOutcome::processed(identifier, point.fingerprint));
            }
        }
        Err(err) => {
            error!(points = batch.len(), "failed to insert batch: {err}");
            for point in batch.drain(..) {
                let identifier = point
                    .payload
                    .identifier
                    .unwrap_or_else(|| point.fingerprint.to_hex());
                summary.push(ItemOutcome::skipped(
                    identifier,
                    Some(point.fingerprint),
                    err.to_string(),
                ));
            }
        }
    }
}
