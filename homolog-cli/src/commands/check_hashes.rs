use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use common_arrayfile::NamedArray;
use common_types::{BatchSummary, ItemOutcome};
use sequence_store::{PgSequenceStore, SequenceStore};

use crate::config::Config;
use crate::error::PipelineError;

pub async fn run(config: &Config, vectors: &Path) -> Result<()> {
    let arrays = common_arrayfile::read_named_arrays(vectors).map_err(PipelineError::ArrayFile)?;
    let store = PgSequenceStore::connect(&config.database_url, config.max_pg_connections)
        .await
        .context("failed to connect to the sequence store")?;

    let summary = verify(&store, &arrays).await?;
    if summary.skipped().count() == 0 {
        println!("All hashes match.");
    }
    println!("{summary}");
    Ok(())
}

/// Checks that every stored fingerprint has a named array in the embedding
/// file. Misses are reported per fingerprint so the embeddings can be
/// recomputed for exactly those sequences.
pub async fn verify(
    store: &dyn SequenceStore,
    arrays: &[NamedArray],
) -> Result<BatchSummary, PipelineError> {
    let names: HashSet<&str> = arrays.iter().map(|array| array.name.as_str()).collect();

    let mut summary = BatchSummary::new();
    for record in store.sequences().await? {
        let hex = record.fingerprint.to_hex();
        if names.contains(hex.as_str()) {
            summary.push(ItemOutcome::processed(&hex, record.fingerprint));
        } else {
            warn!(fingerprint = %record.fingerprint, "no embedding array for this fingerprint");
            summary.push(ItemOutcome::skipped(
                &hex,
                Some(record.fingerprint),
                "no embedding array for this fingerprint",
            ));
        }
    }
    Ok(summary)
}
