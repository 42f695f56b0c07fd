use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    DocRef, DocStoreError, Result, Version, VersionedDoc,
    store::{DocumentStore, WriteBatch, WriteOp},
};

/// PostgreSQL-backed document store.
///
/// Documents live in a single `documents` table with a JSONB payload and a
/// per-row version counter. `apply` runs inside a SQL transaction and takes
/// row locks (`FOR UPDATE`) while re-validating recorded read versions, so
/// two conflicting commits serialize and the loser observes the bumped
/// version.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_doc(row: &PgRow) -> Result<VersionedDoc> {
        Ok(VersionedDoc {
            version: Version::new(row.try_get("version")?),
            data: row.try_get("data")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<VersionedDoc>> {
        let row = sqlx::query(
            "SELECT version, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(doc.collection())
        .bind(doc.id())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_doc).transpose()
    }

    async fn get_many(&self, docs: &[DocRef]) -> Result<Vec<Option<VersionedDoc>>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let collections: Vec<String> = docs.iter().map(|d| d.collection().to_string()).collect();
        let ids: Vec<String> = docs.iter().map(|d| d.id().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT d.collection, d.id, d.version, d.data
            FROM documents d
            JOIN UNNEST($1::text[], $2::text[]) AS r(collection, id)
              ON d.collection = r.collection AND d.id = r.id
            "#,
        )
        .bind(&collections)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_ref: HashMap<(String, String), VersionedDoc> = HashMap::new();
        for row in &rows {
            let key = (row.try_get("collection")?, row.try_get("id")?);
            by_ref.insert(key, Self::row_to_doc(row)?);
        }

        Ok(docs
            .iter()
            .map(|doc| by_ref.remove(&(doc.collection().to_string(), doc.id().to_string())))
            .collect())
    }

    async fn set(&self, doc: &DocRef, data: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, data)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data,
                          version = documents.version + 1,
                          updated_at = now()
            "#,
        )
        .bind(doc.collection())
        .bind(doc.id())
        .bind(&data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(doc.collection())
            .bind(doc.id())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Re-validate reads, locking the rows so a concurrent commit cannot
        // slip between the check and our writes. Absent documents cannot be
        // row-locked; a conflicting create between read and commit is caught
        // by the version check at the loser's next retry.
        for (doc, expected) in &batch.reads {
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT version FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
            )
            .bind(doc.collection())
            .bind(doc.id())
            .fetch_optional(&mut *tx)
            .await?;

            let actual = current.map(Version::new);
            if actual != *expected {
                metrics::counter!("docstore_conflicts_total").increment(1);
                return Err(DocStoreError::Conflict {
                    doc: doc.clone(),
                    expected: *expected,
                    actual,
                });
            }
        }

        for write in &batch.writes {
            match write {
                WriteOp::Set { doc, data } => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, version, data)
                        VALUES ($1, $2, 1, $3)
                        ON CONFLICT (collection, id)
                        DO UPDATE SET data = EXCLUDED.data,
                                      version = documents.version + 1,
                                      updated_at = now()
                        "#,
                    )
                    .bind(doc.collection())
                    .bind(doc.id())
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                WriteOp::Update { doc, fields } => {
                    let patch = Value::Object(fields.clone());
                    let updated = sqlx::query(
                        r#"
                        UPDATE documents
                        SET data = data || $3, version = version + 1, updated_at = now()
                        WHERE collection = $1 AND id = $2
                        "#,
                    )
                    .bind(doc.collection())
                    .bind(doc.id())
                    .bind(&patch)
                    .execute(&mut *tx)
                    .await?;

                    if updated.rows_affected() == 0 {
                        return Err(DocStoreError::NotFound(doc.clone()));
                    }
                }
                WriteOp::Delete { doc } => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(doc.collection())
                        .bind(doc.id())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
