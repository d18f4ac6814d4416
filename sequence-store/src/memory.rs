use std::sync::Mutex;

use async_trait::async_trait;

use common_types::{
    AnnotationValue, Fingerprint, HomologBundle, InsertOutcome, SequenceRecord, SourceLink,
};

use crate::{AnnotationRef, SequenceStore, SourceRef, StoreError};

/// In-memory store with the same contract as the Postgres one. Backs tests
/// and offline runs; vocabulary rows are registered directly instead of
/// being created out of band.
#[derive(Default)]
pub struct MemorySequenceStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Vec<SequenceRecord>,
    sources: Vec<SourceRef>,
    annotations: Vec<AnnotationRef>,
    links: Vec<SourceLink>,
    values: Vec<AnnotationValue>,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(&self, name: &str) -> SourceRef {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(existing) = inner.sources.iter().find(|s| s.name == name) {
            return existing.clone();
        }
        let source = SourceRef {
            id: inner.sources.len() as i64 + 1,
            name: name.to_owned(),
        };
        inner.sources.push(source.clone());
        source
    }

    pub fn register_annotation(&self, name: &str) -> AnnotationRef {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(existing) = inner.annotations.iter().find(|a| a.name == name) {
            return existing.clone();
        }
        let annotation = AnnotationRef {
            id: inner.annotations.len() as i64 + 1,
            name: name.to_owned(),
        };
        inner.annotations.push(annotation.clone());
        annotation
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").records.len()
    }

    pub fn link_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").links.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").values.len()
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.records.iter().any(|r| r.fingerprint == *fingerprint))
    }

    async fn insert_if_absent(
        &self,
        record: &SequenceRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner
            .records
            .iter()
            .any(|r| r.fingerprint == record.fingerprint)
        {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        inner.records.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn sequences(&self) -> Result<Vec<SequenceRecord>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.records.clone())
    }

    async fn source_by_name(&self, name: &str) -> Result<Option<SourceRef>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.sources.iter().find(|s| s.name == name).cloned())
    }

    async fn annotation_by_name(&self, name: &str) -> Result<Option<AnnotationRef>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.annotations.iter().find(|a| a.name == name).cloned())
    }

    async fn link_source(
        &self,
        fingerprint: &Fingerprint,
        source: &SourceRef,
        identifier: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if !inner.records.iter().any(|r| r.fingerprint == *fingerprint) {
            return Err(StoreError::UnknownProtein {
                fingerprint: *fingerprint,
            });
        }
        if inner
            .links
            .iter()
            .any(|l| l.source == source.name && l.identifier == identifier)
        {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        inner.links.push(SourceLink {
            fingerprint: *fingerprint,
            source: source.name.clone(),
            identifier: identifier.to_owned(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn record_for_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let Some(link) = inner.links.iter().find(|l| l.identifier == identifier) else {
            return Ok(None);
        };
        Ok(inner
            .records
            .iter()
            .find(|r| r.fingerprint == link.fingerprint)
            .cloned())
    }

    async fn annotate(
        &self,
        fingerprint: &Fingerprint,
        annotation: &AnnotationRef,
        value: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if !inner.records.iter().any(|r| r.fingerprint == *fingerprint) {
            return Err(StoreError::UnknownProtein {
                fingerprint: *fingerprint,
            });
        }
        if inner
            .values
            .iter()
            .any(|v| v.fingerprint == *fingerprint && v.kind == annotation.name)
        {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        inner.values.push(AnnotationValue {
            fingerprint: *fingerprint,
            kind: annotation.name.clone(),
            value: value.clone(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn bundle(&self, fingerprint: &Fingerprint) -> Result<Option<HomologBundle>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let Some(record) = inner
            .records
            .iter()
            .find(|r| r.fingerprint == *fingerprint)
        else {
            return Ok(None);
        };
        let identifier = inner
            .links
            .iter()
            .find(|l| l.fingerprint == *fingerprint)
            .map(|l| l.identifier.clone());
        let annotations = inner
            .values
            .iter()
            .filter(|v| v.fingerprint == *fingerprint)
            .map(|v| v.value.clone())
            .collect();
        Ok(Some(HomologBundle {
            identifier,
            sequence: record.sequence.clone(),
            annotations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let store = MemorySequenceStore::new();
        let record = SequenceRecord::new("MKVLATRE");

        assert_eq!(
            store.insert_if_absent(&record).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_if_absent(&record).await.unwrap(),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(store.record_count(), 1);
        assert!(store.exists(&record.fingerprint).await.unwrap());
    }

    #[tokio::test]
    async fn test_link_source_is_idempotent_per_source_and_identifier() {
        let store = MemorySequenceStore::new();
        let record = SequenceRecord::new("MKV");
        store.insert_if_absent(&record).await.unwrap();
        let uniprot = store.register_source("uniprot");

        assert_eq!(
            store
                .link_source(&record.fingerprint, &uniprot, "Q6GZX4")
                .await
                .unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store
                .link_source(&record.fingerprint, &uniprot, "Q6GZX4")
                .await
                .unwrap(),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(store.link_count(), 1);
    }

    #[tokio::test]
    async fn test_link_source_requires_a_stored_protein() {
        let store = MemorySequenceStore::new();
        let uniprot = store.register_source("uniprot");
        let missing = Fingerprint::of_sequence("MKV");

        match store.link_source(&missing, &uniprot, "Q6GZX4").await {
            Err(StoreError::UnknownProtein { fingerprint }) => assert_eq!(fingerprint, missing),
            other => panic!("expected UnknownProtein, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_annotate_is_idempotent_per_kind() {
        let store = MemorySequenceStore::new();
        let record = SequenceRecord::new("MKV");
        store.insert_if_absent(&record).await.unwrap();
        let kind = store.register_annotation("properties");

        let value = json!({"ec": "3.1.1.3"});
        assert_eq!(
            store
                .annotate(&record.fingerprint, &kind, &value)
                .await
                .unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store
                .annotate(&record.fingerprint, &kind, &value)
                .await
                .unwrap(),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(store.annotation_count(), 1);
    }

    #[tokio::test]
    async fn test_bundle_joins_identifier_sequence_and_annotations() {
        let store = MemorySequenceStore::new();
        let record = SequenceRecord::new("MKVLATRE");
        store.insert_if_absent(&record).await.unwrap();
        let uniprot = store.register_source("uniprot");
        store
            .link_source(&record.fingerprint, &uniprot, "Q6GZX4")
            .await
            .unwrap();
        let kind = store.register_annotation("properties");
        store
            .annotate(&record.fingerprint, &kind, &json!({"length": 8}))
            .await
            .unwrap();

        let bundle = store.bundle(&record.fingerprint).await.unwrap().unwrap();
        assert_eq!(bundle.identifier.as_deref(), Some("Q6GZX4"));
        assert_eq!(bundle.sequence, "MKVLATRE");
        assert_eq!(bundle.annotations, vec![json!({"length": 8})]);
    }

    #[tokio::test]
    async fn test_bundle_is_none_for_unknown_fingerprints() {
        let store = MemorySequenceStore::new();
        let missing = Fingerprint::of_sequence("MKV");
        assert!(store.bundle(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_for_identifier_follows_links() {
        let store = MemorySequenceStore::new();
        let record = SequenceRecord::new("MKV");
        store.insert_if_absent(&record).await.unwrap();
        let uniprot = store.register_source("uniprot");
        store
            .link_source(&record.fingerprint, &uniprot, "Q6GZX4")
            .await
            .unwrap();

        let found = store.record_for_identifier("Q6GZX4").await.unwrap();
        assert_eq!(found, Some(record));
        assert!(store.record_for_identifier("P0A7G6").await.unwrap().is_none());
    }
}
