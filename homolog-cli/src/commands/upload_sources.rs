use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use common_fasta::{FastaRecord, HeaderFormat};
use common_types::{BatchSummary, InsertOutcome, ItemOutcome};
use sequence_store::{PgSequenceStore, SequenceStore};

use crate::config::Config;
use crate::error::PipelineError;

pub async fn run(config: &Config, fasta: &Path, source: &str, header_format: &str) -> Result<()> {
    let header_format: HeaderFormat = header_format.parse()?;
    let records = common_fasta::read_fasta(fasta).map_err(PipelineError::Parse)?;
    let store = PgSequenceStore::connect(&config.database_url, config.max_pg_connections)
        .await
        .context("failed to connect to the sequence store")?;

    let summary = link(&store, &records, source, header_format).await?;
    println!("{summary}");
    Ok(())
}

/// Walks every stored sequence and, where the FASTA file has the same
/// sequence, links the header-derived identifier under the named source.
/// The source must already exist; links are idempotent per (source,
/// identifier).
pub async fn link(
    store: &dyn SequenceStore,
    records: &[FastaRecord],
    source_name: &str,
    header_format: HeaderFormat,
) -> Result<BatchSummary, PipelineError> {
    let source = store
        .source_by_name(source_name)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("source {source_name:?}")))?;

    let headers_by_sequence: HashMap<&str, &str> = records
        .iter()
        .map(|record| (record.sequence.as_str(), record.id.as_str()))
        .collect();

    let mut summary = BatchSummary::new();
    for stored in store.sequences().await? {
        let Some(header) = headers_by_sequence.get(stored.sequence.as_str()) else {
            continue;
        };
        let Some(identifier) = header_format.identifier(header) else {
            warn!(header, "cannot derive an identifier from this header");
            summary.push(ItemOutcome::skipped(
                *header,
                Some(stored.fingerprint),
                "cannot derive an identifier from the header",
            ));
            continue;
        };
        match store
            .link_source(&stored.fingerprint, &source, &identifier)
            .await
        {
            Ok(InsertOutcome::Inserted) => {
                info!(%identifier, fingerprint = %stored.fingerprint, "linked");
                summary.push(ItemOutcome::processed(&identifier, stored.fingerprint));
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                info!(%identifier, "link already present, skipping insertion");
                summary.push(ItemOutcome::processed(&identifier, stored.fingerprint));
            }
            Err(err) => {
                error!(%identifier, "link failed: {err}");
                summary.push(ItemOutcome::skipped(
                    &identifier,
                    Some(stored.fingerprint),
                    err.to_string(),
                ));
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_types::SequenceRecord;
    use sequence_store::MemorySequenceStore;

    #[tokio::test]
    async fn test_link_matches_stored_sequences_to_accessions() {
        let store = MemorySequenceStore::new();
        store.register_source("uniprot");
        store
            .insert_if_absent(&SequenceRecord::new("MKV"))
            .await
            .unwrap();

        let records = vec![FastaRecord {
            id: "sp|Q6GZX4|001R_FRG3G".into(),
            sequence: "MKV".into(),
        }];

        let summary = link(&store, &records, "uniprot", HeaderFormat::Uniprot)
            .await
            .unwrap();
        assert_eq!(summary.processed(), 1);
        assert_eq!(store.link_count(), 1);

        // running it again does not duplicate the link
        let summary = link(&store, &records, "uniprot", HeaderFormat::Uniprot)
            .await
            .unwrap();
        assert_eq!(summary.processed(), 1);
        assert_eq!(store.link_count(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_headers_are_skipped() {
        let store = MemorySequenceStore::new();
        store.register_source("uniprot");
        store
            .insert_if_absent(&SequenceRecord::new("MKV"))
            .await
            .unwrap();

        let records = vec![FastaRecord {
            id: "no pipes here".into(),
            sequence: "MKV".into(),
        }];

        let summary = link(&store, &records, "uniprot", HeaderFormat::Uniprot)
            .await
            .unwrap();
        assert_eq!(summary.processed(), 0);
        assert_eq!(summary.skipped().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let store = MemorySequenceStore::new();
        let records = vec![FastaRecord {
            id: "sp|Q6GZX4|X".into(),
            sequence: "MKV".into(),
        }];

        match link(&store, &records, "uniprot", HeaderFormat::Uniprot).await {
            Err(PipelineError::NotFound(what)) => assert!(what.contains("uniprot")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
