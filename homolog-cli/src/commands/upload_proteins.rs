use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use common_fasta::{FastaRecord, HeaderFormat};
use common_types::{BatchSummary, InsertOutcome, ItemOutcome, SequenceRecord};
use sequence_store::{PgSequenceStore, SequenceStore};

use crate::config::Config;
use crate::error::PipelineError;

pub async fn run(config: &Config, fasta: &Path, header_format: &str) -> Result<()> {
    let header_format: HeaderFormat = header_format.parse()?;
    let records = common_fasta::read_fasta(fasta).map_err(PipelineError::Parse)?;
    let store = PgSequenceStore::connect(&config.database_url, config.max_pg_connections)
        .await
        .context("failed to connect to the sequence store")?;

    let summary = upload(&store, &records, header_format).await;
    println!("{summary}");
    Ok(())
}

/// Hashes each record and stores the unseen ones. Duplicates are reported
/// and counted as processed; only store failures skip an item.
pub async fn upload(
    store: &dyn SequenceStore,
    records: &[FastaRecord],
    header_format: HeaderFormat,
) -> BatchSummary {
    let mut summary = BatchSummary::new();
    for record in records {
        let identifier = header_format
            .identifier(&record.id)
            .unwrap_or_else(|| record.id.clone());
        let sequence = SequenceRecord::new(record.sequence.clone());
        match store.insert_if_absent(&sequence).await {
            Ok(InsertOutcome::Inserted) => {
                info!(%identifier, fingerprint = %sequence.fingerprint, "stored new sequence");
                summary.push(ItemOutcome::processed(&identifier, sequence.fingerprint));
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                println!(
                    "Hash: {}, Identifier: {} already present",
                    sequence.fingerprint, identifier
                );
                summary.push(ItemOutcome::processed(&identifier, sequence.fingerprint));
            }
            Err(err) => {
                error!(%identifier, fingerprint = %sequence.fingerprint, "insert failed: {err}");
                summary.push(ItemOutcome::skipped(
                    &identifier,
                    Some(sequence.fingerprint),
                    err.to_string(),
                ));
            }
        }
    }
    summary
}
