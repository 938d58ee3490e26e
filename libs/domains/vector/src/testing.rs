//! Shared fixtures for unit tests

use std::sync::Arc;

use async_trait::async_trait;
use database::postgres::{PoolConnector, PoolManager, RetryExecutor};
use database::{DatabaseResult, RetryConfig};
use sea_orm::DatabaseConnection;
use serde_json::json;
use uuid::Uuid;

use crate::models::{Document, DocumentInput};

/// Hands out a prepared (usually mock) connection
pub struct MockConnector(pub DatabaseConnection);

#[async_trait]
impl PoolConnector for MockConnector {
    type Pool = DatabaseConnection;

    async fn connect(&self) -> DatabaseResult<DatabaseConnection> {
        Ok(self.0.clone())
    }

    async fn close(&self, _pool: DatabaseConnection) -> DatabaseResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

pub fn mock_executor(db: DatabaseConnection, retry: RetryConfig) -> RetryExecutor<MockConnector> {
    RetryExecutor::new(Arc::new(PoolManager::new(MockConnector(db))), retry)
}

pub fn document(id: &str, site_id: Uuid) -> Document {
    Document {
        id: id.to_string(),
        url: format!("https://example.com/{id}"),
        name: id.to_uppercase(),
        schema_json: json!({"@type": "Thing", "name": id}),
        site_id,
        document_id: Uuid::new_v4(),
        content: format!("content of {id}"),
        embedding: vec![0.1, 0.2, 0.3],
    }
}

pub fn input(id: &str, site_id: Uuid) -> DocumentInput {
    document(id, site_id).into()
}
