use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};

use common_types::{BatchSummary, InsertOutcome, ItemOutcome};
use sequence_store::{PgSequenceStore, SequenceStore};

use crate::config::Config;
use crate::error::PipelineError;

pub async fn run(config: &Config, json: &Path, annotation: &str) -> Result<()> {
    let text = fs::read_to_string(json)
        .with_context(|| format!("failed to read {}", json.display()))?;
    let parsed: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", json.display()))?;
    let serde_json::Value::Object(entries) = parsed else {
        return Err(anyhow!(
            "{} must be a JSON object mapping identifier -> payload",
            json.display()
        ));
    };

    let store = PgSequenceStore::connect(&config.database_url, config.max_pg_connections)
        .await
        .context("failed to connect to the sequence store")?;

    let summary = annotate(&store, &entries, annotation).await?;
    println!("{summary}");
    Ok(())
}

/// Attaches one payload per identifier under the named annotation kind.
/// The kind must already exist; a second upload of the same file is a
/// no-op. Identifiers with no source link are logged and skipped.
pub async fn annotate(
    store: &dyn SequenceStore,
    entries: &serde_json::Map<String, serde_json::Value>,
    annotation_name: &str,
) -> Result<BatchSummary, PipelineError> {
    let annotation = store
        .annotation_by_name(annotation_name)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("annotation {annotation_name:?}")))?;

    let mut summary = BatchSummary::new();
    for (identifier, payload) in entries {
        let record = match store.record_for_identifier(identifier).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(%identifier, "identifier is not linked to any stored sequence");
                summary.push(ItemOutcome::skipped(
                    identifier,
                    None,
                    "identifier is not linked to any stored sequence",
                ));
                continue;
            }
            Err(err) => {
                error!(%identifier, "lookup failed: {err}");
                summary.push(ItemOutcome::skipped(identifier, None, err.to_string()));
                continue;
            }
        };
        match store
            .annotate(&record.fingerprint, &annotation, payload)
            .await
        {
            Ok(InsertOutcome::Inserted) => {
                info!(%identifier, fingerprint = %record.fingerprint, "annotated");
                summary.push(ItemOutcome::processed(identifier, record.fingerprint));
            }
            Ok(InsertOutcome::AlreadyPresent) => {
                info!(%identifier, "annotation already present, skipping insertion");
                summary.push(ItemOutcome::processed(identifier, record.fingerprint));
            }
            Err(err) => {
                error!(%identifier, "annotation insert failed: {err}");
                summary.push(ItemOutcome::skipped(
                    identifier,
                    Some(record.fingerprint),
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
    use serde_json::json;

    async fn seeded_store() -> MemorySequenceStore {
        let store = MemorySequenceStore::new();
        let uniprot = store.register_source("uniprot");
        store.register_annotation("properties");
        let record = SequenceRecord::new("MKV");
        store.insert_if_absent(&record).await.unwrap();
        store
            .link_source(&record.fingerprint, &uniprot, "Q6GZX4")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_uploading_the_same_file_twice_keeps_one_row() {
        let store = seeded_store().await;
        let serde_json::Value::Object(entries) =
            json!({"Q6GZX4": {"ec": "3.1.1.3"}, "UNKNOWN": {"ec": "1.1.1.1"}})
        else {
            unreachable!()
        };

        let first = annotate(&store, &entries, "properties").await.unwrap();
        assert_eq!(first.processed(), 1);
        assert_eq!(first.skipped().count(), 1);
        assert_eq!(store.annotation_count(), 1);

        let second = annotate(&store, &entries, "properties").await.unwrap();
        assert_eq!(second.processed(), 1);
        assert_eq!(store.annotation_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_annotation_kind_is_fatal() {
        let store = seeded_store().await;
        let serde_json::Value::Object(entries) = json!({"Q6GZX4": {}}) else {
            unreachable!()
        };

        match annotate(&store, &entries, "no-such-kind").await {
            Err(PipelineError::NotFound(what)) => assert!(what.contains("no-such-kind")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
