//! Similarity search over stored embeddings

use std::sync::Arc;
use std::time::Instant;

use database::DatabaseError;
use database::postgres::{PgConnector, PoolConnector, RetryExecutor};
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement, Value};
use serde_json::Value as Json;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::VectorStoreConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};
use crate::models::{
    DistanceMetric, DocumentMatch, SimilarityResult, SiteScope, pretty_json, vector_literal,
};

#[derive(Debug, FromQueryResult)]
struct SimilarityRow {
    name: String,
    url: String,
    distance: f64,
    site_id: Uuid,
    schema_json: Option<Json>,
}

impl From<SimilarityRow> for SimilarityResult {
    fn from(row: SimilarityRow) -> Self {
        Self {
            url: row.url,
            schema_json: pretty_json(&row.schema_json.unwrap_or(Json::Null)),
            name: row.name,
            site_id: row.site_id,
            distance: row.distance,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct UrlRow {
    url: String,
    schema_json: Option<Json>,
    site_id: Uuid,
    name: String,
}

impl From<UrlRow> for DocumentMatch {
    fn from(row: UrlRow) -> Self {
        Self {
            url: row.url,
            schema_json: pretty_json(&row.schema_json.unwrap_or(Json::Null)),
            name: row.name,
            site_id: row.site_id,
        }
    }
}

pub struct SimilaritySearchEngine<C = PgConnector>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    executor: RetryExecutor<C>,
    provider: Arc<dyn EmbeddingProvider>,
    config: Arc<VectorStoreConfig>,
}

impl<C> SimilaritySearchEngine<C>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    pub fn new(
        executor: RetryExecutor<C>,
        provider: Arc<dyn EmbeddingProvider>,
        config: Arc<VectorStoreConfig>,
    ) -> Self {
        Self {
            executor,
            provider,
            config,
        }
    }

    /// Rank documents by distance to the embedding of `query`.
    ///
    /// The embedding is computed before any database work; a provider
    /// failure means the database is never touched.
    pub async fn search(
        &self,
        query: &str,
        scope: SiteScope,
        num_results: u64,
        metric: DistanceMetric,
    ) -> VectorResult<Vec<SimilarityResult>> {
        if query.trim().is_empty() {
            return Err(VectorError::Validation("query must not be empty".to_string()));
        }

        let started = Instant::now();
        let preview: String = query.chars().take(50).collect();
        info!(query = %preview, site = %scope, num_results, metric = metric.as_str(), "Searching");

        let embedding = self.provider.embed(query).await.inspect_err(|e| {
            error!(model = self.provider.model(), error = %e, "Error generating embedding for query");
        })?;

        let stmt = build_search_statement(self.config.table(), &embedding, scope, num_results, metric);
        let rows = self
            .executor
            .run("search", |db| {
                let stmt = stmt.clone();
                async move {
                    SimilarityRow::find_by_statement(stmt)
                        .all(&db)
                        .await
                        .map_err(DatabaseError::from)
                }
            })
            .await?;

        let results: Vec<SimilarityResult> = rows.into_iter().map(Into::into).collect();
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            found = results.len(),
            "Search completed"
        );
        Ok(results)
    }

    /// Case-insensitive substring match on `url` within one site.
    pub async fn search_by_url(&self, url: &str, site_id: Uuid) -> VectorResult<Option<DocumentMatch>> {
        if url.trim().is_empty() {
            return Err(VectorError::Validation("url must not be empty".to_string()));
        }

        let stmt = build_url_statement(self.config.table(), url, site_id);
        let row = self
            .executor
            .run("search_by_url", |db| {
                let stmt = stmt.clone();
                async move {
                    UrlRow::find_by_statement(stmt)
                        .one(&db)
                        .await
                        .map_err(DatabaseError::from)
                }
            })
            .await?;

        if row.is_none() {
            info!(%site_id, "No document found for url");
        }
        Ok(row.map(Into::into))
    }
}

pub(crate) fn build_search_statement(
    table: &str,
    embedding: &[f32],
    scope: SiteScope,
    num_results: u64,
    metric: DistanceMetric,
) -> Statement {
    let limit = i64::try_from(num_results).unwrap_or(i64::MAX);
    let mut values: Vec<Value> = vec![vector_literal(embedding).into()];

    let where_clause = match scope {
        SiteScope::All => "",
        SiteScope::Specific(site_id) => {
            values.push(site_id.into());
            "WHERE site_id = $2"
        }
    };
    values.push(limit.into());

    let sql = format!(
        "SELECT name, url, (embedding {op} $1::vector)::float8 AS distance, site_id, schema_json \
         FROM {table} {where_clause} \
         ORDER BY distance \
         LIMIT ${limit_param}",
        op = metric.operator(),
        limit_param = values.len(),
    );

    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

pub(crate) fn build_url_statement(table: &str, url: &str, site_id: Uuid) -> Statement {
    let pattern = format!("%{}%", escape_like(url));
    let sql = format!(
        "SELECT url, schema_json, site_id, name FROM {table} \
         WHERE url ILIKE $1 ESCAPE '\\' AND site_id = $2 \
         LIMIT 1"
    );
    Statement::from_sql_and_values(DbBackend::Postgres, sql, [pattern.into(), site_id.into()])
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
pub(crate) fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
