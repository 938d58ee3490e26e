//! Batched, validated upsert keyed on `(id, site_id)`

use std::collections::HashSet;
use std::sync::Arc;

use database::DatabaseError;
use database::postgres::{PgConnector, PoolConnector, RetryExecutor};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, TransactionTrait, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{VectorStoreConfig, validate_batch_size};
use crate::error::{VectorError, VectorResult};
use crate::models::{Document, DocumentInput, vector_literal};

/// Bind parameters per upserted row
pub(crate) const COLUMNS_PER_ROW: usize = 8;

pub struct BatchUpsertEngine<C = PgConnector>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    executor: RetryExecutor<C>,
    config: Arc<VectorStoreConfig>,
}

impl<C> BatchUpsertEngine<C>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    pub fn new(executor: RetryExecutor<C>, config: Arc<VectorStoreConfig>) -> Self {
        Self { executor, config }
    }

    /// Upload `documents` in chunks of the configured batch size.
    pub async fn upload(&self, documents: Vec<DocumentInput>) -> VectorResult<u64> {
        self.upload_with_batch_size(documents, self.config.batch_size)
            .await
    }

    /// Upload `documents` in chunks of `batch_size`, returning the number of
    /// rows inserted or updated.
    ///
    /// Invalid documents are skipped and logged. Each chunk commits in its
    /// own transaction; a chunk that fails after retries aborts the upload
    /// with earlier chunks already committed.
    pub async fn upload_with_batch_size(
        &self,
        documents: Vec<DocumentInput>,
        batch_size: usize,
    ) -> VectorResult<u64> {
        validate_batch_size(batch_size).map_err(VectorError::Validation)?;

        info!(count = documents.len(), batch_size, "Uploading documents");
        if documents.is_empty() {
            warn!("Empty documents list provided");
            return Ok(0);
        }

        let total_batches = documents.len().div_ceil(batch_size);
        let mut total: u64 = 0;

        for (index, chunk) in documents.chunks(batch_size).enumerate() {
            let batch = index + 1;
            debug!(batch, total_batches, size = chunk.len(), "Processing batch");

            let valid = self.validate_chunk(chunk, batch);
            if valid.is_empty() {
                warn!(batch, "No valid documents to insert in batch");
                continue;
            }

            let stmt = build_upsert_statement(self.config.table(), &valid);
            let affected = self
                .executor
                .run("upload_batch", |db| {
                    let stmt = stmt.clone();
                    async move { execute_in_transaction(&db, stmt).await }
                })
                .await?;

            info!(batch, rows = affected, "Batch completed");
            total += affected;
        }

        info!(rows = total, "Successfully uploaded documents");
        Ok(total)
    }

    fn validate_chunk(&self, chunk: &[DocumentInput], batch: usize) -> Vec<Document> {
        let documents = chunk
            .iter()
            .enumerate()
            .filter_map(|(position, input)| {
                match input.clone().validate(self.config.dimension) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        warn!(batch, position, error = %e, "Skipping invalid document");
                        None
                    }
                }
            })
            .collect();

        dedupe_last_wins(documents)
    }
}

async fn execute_in_transaction(
    db: &DatabaseConnection,
    stmt: Statement,
) -> Result<u64, DatabaseError> {
    let txn = db.begin().await?;
    match txn.execute_raw(stmt).await {
        Ok(result) => {
            txn.commit().await?;
            Ok(result.rows_affected())
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e.into())
        }
    }
}

/// Keep only the last occurrence of every `(id, site_id)` pair, in order.
///
/// PostgreSQL rejects an `ON CONFLICT DO UPDATE` that touches the same row twice.
pub(crate) fn dedupe_last_wins(documents: Vec<Document>) -> Vec<Document> {
    let mut seen: HashSet<(String, Uuid)> = HashSet::with_capacity(documents.len());
    let mut kept: Vec<Document> = documents
        .into_iter()
        .rev()
        .filter(|doc| seen.insert((doc.id.clone(), doc.site_id)))
        .collect();
    kept.reverse();
    kept
}

/// One multi-row upsert. `id` and `site_id` are never rewritten on conflict.
pub(crate) fn build_upsert_statement(table: &str, documents: &[Document]) -> Statement {
    let mut placeholders = Vec::with_capacity(documents.len());
    let mut values: Vec<Value> = Vec::with_capacity(documents.len() * COLUMNS_PER_ROW);

    for (row, doc) in documents.iter().enumerate() {
        let base = row * COLUMNS_PER_ROW;
        placeholders.push(format!(
            "(${}, ${}, ${}, ${}, ${}, ${}, ${}, ${}::vector)",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5,
            base + 6,
            base + 7,
            base + 8
        ));

        values.push(doc.id.clone().into());
        values.push(doc.url.clone().into());
        values.push(doc.name.clone().into());
        values.push(doc.schema_json.clone().into());
        values.push(doc.site_id.into());
        values.push(doc.document_id.into());
        values.push(doc.content.clone().into());
        values.push(vector_literal(&doc.embedding).into());
    }

    let sql = format!(
        "INSERT INTO {table} (id, url, name, schema_json, site_id, document_id, content, embedding) \
         VALUES {} \
         ON CONFLICT (id, site_id) DO UPDATE SET \
         url = EXCLUDED.url, \
         name = EXCLUDED.name, \
         schema_json = EXCLUDED.schema_json, \
         document_id = EXCLUDED.document_id, \
         content = EXCLUDED.content, \
         embedding = EXCLUDED.embedding",
        placeholders.join(", ")
    );

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}
