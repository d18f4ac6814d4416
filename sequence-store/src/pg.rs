use async_trait::async_trait;
use sqlx::postgres::PgPool;

use common_types::{Fingerprint, HomologBundle, InsertOutcome, SequenceRecord};

use crate::{AnnotationRef, SequenceStore, SourceRef, StoreError};

/// Postgres-backed store. Idempotence rides on the schema's unique
/// constraints via `ON CONFLICT DO NOTHING`.
pub struct PgSequenceStore {
    pool: PgPool,
}

impl PgSequenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = common_database::get_pool(url, max_connections)
            .await
            .map_err(|error| StoreError::Connection { error })?;
        Ok(Self::new(pool))
    }

    async fn protein_id(&self, fingerprint: &Fingerprint) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar("SELECT id FROM protein WHERE hash = $1")
            .bind(fingerprint.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| StoreError::Query {
                op: "SELECT protein",
                error,
            })
    }
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.protein_id(fingerprint).await?.is_some())
    }

    async fn insert_if_absent(
        &self,
        record: &SequenceRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO protein (hash, sequence)
VALUES ($1, $2)
ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(record.fingerprint.to_hex())
        .bind(&record.sequence)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(InsertOutcome::Inserted),
            Ok(_) => Ok(InsertOutcome::AlreadyPresent),
            // any other unique constraint still means the record is there
            Err(error) if common_database::is_unique_violation(&error) => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(error) => Err(StoreError::Query {
                op: "INSERT protein",
                error,
            }),
        }
    }

    async fn sequences(&self) -> Result<Vec<SequenceRecord>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT hash, sequence FROM protein ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|error| StoreError::Query {
                    op: "SELECT protein",
                    error,
                })?;

        rows.into_iter()
            .map(|(hash, sequence)| {
                let fingerprint = Fingerprint::from_hex(&hash)
                    .map_err(|_| StoreError::BadFingerprint { value: hash })?;
                Ok(SequenceRecord {
                    fingerprint,
                    sequence,
                })
            })
            .collect()
    }

    async fn source_by_name(&self, name: &str) -> Result<Option<SourceRef>, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM source WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| StoreError::Query {
                    op: "SELECT source",
                    error,
                })?;
        Ok(row.map(|(id, name)| SourceRef { id, name }))
    }

    async fn annotation_by_name(&self, name: &str) -> Result<Option<AnnotationRef>, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM annotation WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| StoreError::Query {
                    op: "SELECT annotation",
                    error,
                })?;
        Ok(row.map(|(id, name)| AnnotationRef { id, name }))
    }

    async fn link_source(
        &self,
        fingerprint: &Fingerprint,
        source: &SourceRef,
        identifier: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO protein_source (f_protein_id, f_source_id, identifier)
SELECT p.id, $2, $3
FROM protein p
WHERE p.hash = $1
ON CONFLICT (f_source_id, identifier) DO NOTHING
            "#,
        )
        .bind(fingerprint.to_hex())
        .bind(source.id)
        .bind(identifier)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(done) => done,
            Err(error) if common_database::is_unique_violation(&error) => {
                return Ok(InsertOutcome::AlreadyPresent);
            }
            Err(error) => {
                return Err(StoreError::Query {
                    op: "INSERT protein_source",
                    error,
                });
            }
        };
        if result.rows_affected() == 1 {
            return Ok(InsertOutcome::Inserted);
        }
        // Zero rows is either a duplicate link or a missing protein.
        if self.protein_id(fingerprint).await?.is_none() {
            return Err(StoreError::UnknownProtein {
                fingerprint: *fingerprint,
            });
        }
        Ok(InsertOutcome::AlreadyPresent)
    }

    async fn record_for_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<SequenceRecord>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
SELECT p.hash, p.sequence
FROM protein p
JOIN protein_source ps ON ps.f_protein_id = p.id
WHERE ps.identifier = $1
ORDER BY ps.id
LIMIT 1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| StoreError::Query {
            op: "SELECT protein_source",
            error,
        })?;

        row.map(|(hash, sequence)| {
            let fingerprint = Fingerprint::from_hex(&hash)
                .map_err(|_| StoreError::BadFingerprint { value: hash })?;
            Ok(SequenceRecord {
                fingerprint,
                sequence,
            })
        })
        .transpose()
    }

    async fn annotate(
        &self,
        fingerprint: &Fingerprint,
        annotation: &AnnotationRef,
        value: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO protein_annotation (f_protein_id, f_annotation_id, value)
SELECT p.id, $2, $3
FROM protein p
WHERE p.hash = $1
ON CONFLICT (f_protein_id, f_annotation_id) DO NOTHING
            "#,
        )
        .bind(fingerprint.to_hex())
        .bind(annotation.id)
        .bind(value)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(done) => done,
            Err(error) if common_database::is_unique_violation(&error) => {
                return Ok(InsertOutcome::AlreadyPresent);
            }
            Err(error) => {
                return Err(StoreError::Query {
                    op: "INSERT protein_annotation",
                    error,
                });
            }
        };
        if result.rows_affected() == 1 {
            return Ok(InsertOutcome::Inserted);
        }
        if self.protein_id(fingerprint).await?.is_none() {
            return Err(StoreError::UnknownProtein {
                fingerprint: *fingerprint,
            });
        }
        Ok(InsertOutcome::AlreadyPresent)
    }

    async fn bundle(&self, fingerprint: &Fingerprint) -> Result<Option<HomologBundle>, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, sequence FROM protein WHERE hash = $1")
                .bind(fingerprint.to_hex())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| StoreError::Query {
                    op: "SELECT protein",
                    error,
                })?;
        let Some((protein_id, sequence)) = row else {
            return Ok(None);
        };

        let identifier: Option<String> = sqlx::query_scalar(
            "SELECT identifier FROM protein_source WHERE f_protein_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(protein_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| StoreError::Query {
            op: "SELECT protein_source",
            error,
        })?;

        let annotations: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT value FROM protein_annotation WHERE f_protein_id = $1 ORDER BY id",
        )
        .bind(protein_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| StoreError::Query {
            op: "SELECT protein_annotation",
            error,
        })?;

        Ok(Some(HomologBundle {
            identifier,
            sequence,
            annotations,
        }))
    }
}
