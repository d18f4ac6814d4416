use async_trait::async_trait;
use thiserror::Error;

use common_types::{Fingerprint, HomologBundle, InsertOutcome, SequenceRecord};

mod memory;
mod pg;

pub use memory::MemorySequenceStore;
pub use pg::PgSequenceStore;

/// A `source` vocabulary row. Created out of band; looked up once per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub id: i64,
    pub name: String,
}

/// An `annotation` vocabulary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRef {
    pub id: i64,
    pub name: String,
}

/// Enumeration of errors for operations on the sequence store.
/// Errors can originate from sqlx and are wrapped to say which operation failed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection failed: {error}")]
    Connection { error: sqlx::Error },
    #[error("{op} query failed: {error}")]
    Query {
        op: &'static str,
        error: sqlx::Error,
    },
    #[error("no stored sequence with fingerprint {fingerprint}")]
    UnknownProtein { fingerprint: Fingerprint },
    #[error("stored hash {value:?} is not a 128-bit hex fingerprint")]
    BadFingerprint { value: String },
}

impl StoreError {
    /// True when the store itself is unreachable, as opposed to a bad query
    /// or missing row. The batch loop logs these and moves on.
    pub fn is_connectivity(&self) -> bool {
        match self {
            StoreError::Connection { error } | StoreError::Query { error, .. } => {
                common_database::is_connectivity_error(error)
            }
            _ => false,
        }
    }
}

/// Relational half of the pipeline, behind a trait so batch logic can run
/// against Postgres or an in-memory fake.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError>;

    /// Idempotent: inserting an already-stored fingerprint is reported, not
    /// an error, and never creates a second row.
    async fn insert_if_absent(&self, record: &SequenceRecord)
        -> Result<InsertOutcome, StoreError>;

    /// Every stored sequence, for the bulk jobs that sweep the whole table.
    async fn sequences(&self) -> Result<Vec<SequenceRecord>, StoreError>;

    async fn source_by_name(&self, name: &str) -> Result<Option<SourceRef>, StoreError>;

    async fn annotation_by_name(&self, name: &str) -> Result<Option<AnnotationRef>, StoreError>;

    /// Idempotent per (source, identifier). Unknown fingerprints are an
    /// error; links never create proteins.
    async fn link_source(
        &self,
        fingerprint: &Fingerprint,
        source: &SourceRef,
        identifier: &str,
    ) -> Result<InsertOutcome, StoreError>;

    /// Resolves an external identifier back to its sequence via the source
    /// links.
    async fn record_for_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<SequenceRecord>, StoreError>;

    /// Idempotent per (fingerprint, annotation kind).
    async fn annotate(
        &self,
        fingerprint: &Fingerprint,
        annotation: &AnnotationRef,
        value: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError>;

    /// The assembled neighbor bundle: identifier from the first source link,
    /// the sequence, and every annotation payload. None for unknown
    /// fingerprints; the caller decides whether that degrades to a
    /// placeholder.
    async fn bundle(&self, fingerprint: &Fingerprint) -> Result<Option<HomologBundle>, StoreError>;
}
