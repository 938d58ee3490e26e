use std::collections::BTreeSet;
use std::sync::Arc;

use core_config::FromEnv;
use database::DatabaseError;
use database::postgres::{self, PgConnector, PoolConnector, PoolManager, PostgresConfig, RetryExecutor};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::VectorStoreConfig;
use crate::diagnostics::{self, ConnectionDiagnostics, ConnectionSummary, SchemaReport};
use crate::embedding::EmbeddingProvider;
use crate::error::VectorResult;
use crate::models::{DistanceMetric, DocumentInput, DocumentMatch, SimilarityResult, SiteScope};
use crate::search::SimilaritySearchEngine;
use crate::upsert::BatchUpsertEngine;

/// Environment prefix of the vector database settings (`VECTOR_DB_URL`, ...)
pub const ENV_PREFIX: &str = "VECTOR_DB";

#[derive(Debug, FromQueryResult)]
struct SiteRow {
    site_id: Option<Uuid>,
}

/// Entry point to the vector store: uploads, deletes, searches and diagnostics
/// over one lazily opened pool.
pub struct VectorStoreClient<C = PgConnector>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    executor: RetryExecutor<C>,
    upserts: BatchUpsertEngine<C>,
    searches: SimilaritySearchEngine<C>,
    config: Arc<VectorStoreConfig>,
    target: String,
}

impl VectorStoreClient<PgConnector> {
    /// Build from `VECTOR_DB_*` / `VECTOR_*` variables. Connects on first use.
    pub fn from_env(provider: Arc<dyn EmbeddingProvider>) -> VectorResult<Self> {
        let postgres = PostgresConfig::from_env_with_prefix(ENV_PREFIX)?;
        let config = VectorStoreConfig::from_env()?;
        Ok(Self::connect_lazy(postgres, config, provider))
    }

    pub fn connect_lazy(
        postgres: PostgresConfig,
        config: VectorStoreConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::new(Arc::new(postgres::pool_manager(postgres)), config, provider)
    }
}

impl<C> VectorStoreClient<C>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    pub fn new(
        pool: Arc<PoolManager<C>>,
        config: VectorStoreConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let target = pool.connector().describe();
        let config = Arc::new(config);
        let executor = RetryExecutor::new(pool, config.retry.clone());

        info!(%target, table = config.table(), "Vector store client created");

        Self {
            upserts: BatchUpsertEngine::new(executor.clone(), Arc::clone(&config)),
            searches: SimilaritySearchEngine::new(executor.clone(), provider, Arc::clone(&config)),
            executor,
            config,
            target,
        }
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    pub async fn upload_documents(&self, documents: Vec<DocumentInput>) -> VectorResult<u64> {
        self.upserts.upload(documents).await
    }

    pub async fn upload_documents_in_batches(
        &self,
        documents: Vec<DocumentInput>,
        batch_size: usize,
    ) -> VectorResult<u64> {
        self.upserts.upload_with_batch_size(documents, batch_size).await
    }

    /// Delete every document of `site_id`, returning how many rows went away
    pub async fn delete_documents_by_site(&self, site_id: Uuid) -> VectorResult<u64> {
        info!(%site_id, "Deleting documents for site");

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            format!("DELETE FROM {} WHERE site_id = $1", self.config.table()),
            [site_id.into()],
        );
        let deleted = self
            .executor
            .run("delete_documents_by_site", |db| {
                let stmt = stmt.clone();
                async move {
                    db.execute_raw(stmt)
                        .await
                        .map(|result| result.rows_affected())
                        .map_err(DatabaseError::from)
                }
            })
            .await?;

        info!(%site_id, deleted, "Deleted documents");
        Ok(deleted)
    }

    /// Search with the configured result count and metric
    pub async fn search(&self, query: &str, scope: SiteScope) -> VectorResult<Vec<SimilarityResult>> {
        self.searches
            .search(query, scope, self.config.num_results, self.config.metric)
            .await
    }

    pub async fn search_with(
        &self,
        query: &str,
        scope: SiteScope,
        num_results: u64,
        metric: DistanceMetric,
    ) -> VectorResult<Vec<SimilarityResult>> {
        self.searches.search(query, scope, num_results, metric).await
    }

    pub async fn search_all_sites(
        &self,
        query: &str,
        num_results: u64,
    ) -> VectorResult<Vec<SimilarityResult>> {
        self.searches
            .search(query, SiteScope::All, num_results, self.config.metric)
            .await
    }

    pub async fn search_by_url(&self, url: &str, site_id: Uuid) -> VectorResult<Option<DocumentMatch>> {
        self.searches.search_by_url(url, site_id).await
    }

    /// Distinct site ids with at least one document; `None` when the lookup fails
    pub async fn get_sites(&self) -> Option<BTreeSet<Uuid>> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("SELECT DISTINCT site_id FROM {}", self.config.table()),
        );

        let result = self
            .executor
            .run("get_sites", |db| {
                let stmt = stmt.clone();
                async move {
                    SiteRow::find_by_statement(stmt)
                        .all(&db)
                        .await
                        .map_err(DatabaseError::from)
                }
            })
            .await;

        match result {
            Ok(rows) => Some(rows.into_iter().filter_map(|r| r.site_id).collect()),
            Err(e) => {
                error!(error = %e, "Failed to list sites");
                None
            }
        }
    }

    pub async fn test_connection(&self) -> ConnectionDiagnostics {
        let summary = ConnectionSummary {
            target: self.target.clone(),
            table: self.config.table().to_string(),
        };
        diagnostics::test_connection(&self.executor, self.config.table(), summary).await
    }

    pub async fn check_table_schema(&self) -> VectorResult<SchemaReport> {
        diagnostics::check_table_schema(&self.executor, self.config.table()).await
    }

    /// Release the pool. Further calls fail with `PoolClosed`.
    pub async fn close(&self) -> VectorResult<()> {
        self.executor.pool_manager().close().await?;
        info!(target = %self.target, "Vector store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::testing::MockConnector;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn client(db: DatabaseConnection) -> VectorStoreClient<MockConnector> {
        VectorStoreClient::new(
            Arc::new(PoolManager::new(MockConnector(db))),
            VectorStoreConfig::default(),
            Arc::new(MockEmbeddingProvider::new()),
        )
    }

    #[tokio::test]
    async fn test_delete_returns_rows_affected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 4,
            }])
            .into_connection();

        assert_eq!(client(db).delete_documents_by_site(Uuid::new_v4()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_get_sites_collects_distinct_ids() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rows = [a, b].map(|id| BTreeMap::from([("site_id", Value::from(id))]));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows.to_vec()])
            .into_connection();

        let sites = client(db).get_sites().await.unwrap();
        assert_eq!(sites, BTreeSet::from([a, b]));
    }

    #[tokio::test]
    async fn test_get_sites_failure_is_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("permission denied for table".into())])
            .into_connection();

        assert_eq!(client(db).get_sites().await, None);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let client = client(db);

        client.close().await.unwrap();
        client.close().await.unwrap();

        let err = client.delete_documents_by_site(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::VectorError::Database(DatabaseError::PoolClosed)
        ));
        assert_eq!(client.get_sites().await, None);
    }
}
