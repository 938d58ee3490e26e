//! Connection and schema diagnostics for operators

use std::collections::BTreeMap;

use database::DatabaseResult;
use database::postgres::{PoolConnector, RetryExecutor, vector_extension_installed};
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::VectorResult;

/// Columns the embeddings table must have, with their `udt_name`
pub const REQUIRED_COLUMNS: [(&str, &str); 9] = [
    ("id", "text"),
    ("url", "text"),
    ("name", "text"),
    ("schema_json", "jsonb"),
    ("site_id", "uuid"),
    ("document_id", "uuid"),
    ("content", "text"),
    ("embedding", "vector"),
    ("embedding_id", "uuid"),
];

/// Where the store points, without credentials
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConnectionSummary {
    pub target: String,
    pub table: String,
}

/// Outcome of [`VectorStoreClient::test_connection`](crate::VectorStoreClient::test_connection).
///
/// Every check runs independently; a failing one records its message in
/// `errors` and leaves its field at the default.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConnectionDiagnostics {
    pub success: bool,
    pub server_version: Option<String>,
    pub vector_extension: bool,
    pub table_exists: bool,
    pub document_count: Option<i64>,
    pub connection: ConnectionSummary,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SchemaReport {
    pub table_exists: bool,
    /// column name -> type name
    pub columns: BTreeMap<String, String>,
    /// Human readable list of missing or mistyped columns
    pub needs_corrections: Vec<String>,
}

impl SchemaReport {
    pub fn is_valid(&self) -> bool {
        self.table_exists && self.needs_corrections.is_empty()
    }
}

#[derive(Debug, FromQueryResult)]
struct VersionRow {
    version: String,
}

#[derive(Debug, FromQueryResult)]
struct PresentRow {
    present: bool,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total: i64,
}

#[derive(Debug, FromQueryResult)]
struct ColumnRow {
    column_name: String,
    udt_name: String,
}

async fn server_version(db: &DatabaseConnection) -> DatabaseResult<Option<String>> {
    let row = VersionRow::find_by_statement(Statement::from_string(
        DbBackend::Postgres,
        "SELECT version() AS version",
    ))
    .one(db)
    .await?;
    Ok(row.map(|r| r.version))
}

async fn table_exists(db: &DatabaseConnection, table: &str) -> DatabaseResult<bool> {
    let row = PresentRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1) AS present",
        [table.into()],
    ))
    .one(db)
    .await?;
    Ok(row.map(|r| r.present).unwrap_or(false))
}

async fn row_count(db: &DatabaseConnection, table: &str) -> DatabaseResult<i64> {
    let row = CountRow::find_by_statement(Statement::from_string(
        DbBackend::Postgres,
        format!("SELECT COUNT(*)::int8 AS total FROM {table}"),
    ))
    .one(db)
    .await?;
    Ok(row.map(|r| r.total).unwrap_or(0))
}

async fn table_columns(db: &DatabaseConnection, table: &str) -> DatabaseResult<BTreeMap<String, String>> {
    let rows = ColumnRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT column_name::text AS column_name, udt_name::text AS udt_name \
         FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1",
        [table.into()],
    ))
    .all(db)
    .await?;
    Ok(rows.into_iter().map(|r| (r.column_name, r.udt_name)).collect())
}

/// Compare actual columns against [`REQUIRED_COLUMNS`]
pub fn schema_corrections(columns: &BTreeMap<String, String>) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter_map(|(name, expected)| match columns.get(*name) {
            None => Some(format!(
                "Missing required column '{}' of type '{}'",
                name, expected
            )),
            Some(actual) if actual != expected => Some(format!(
                "Column '{}' has wrong type. Expected '{}', found '{}'",
                name, expected, actual
            )),
            Some(_) => None,
        })
        .collect()
}

pub(crate) async fn test_connection<C>(
    executor: &RetryExecutor<C>,
    table: &str,
    connection: ConnectionSummary,
) -> ConnectionDiagnostics
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    info!(target = %connection.target, "Testing PostgreSQL connection");

    let mut diagnostics = ConnectionDiagnostics {
        success: false,
        server_version: None,
        vector_extension: false,
        table_exists: false,
        document_count: None,
        connection,
        errors: Vec::new(),
    };

    match executor
        .run("server_version", |db| async move { server_version(&db).await })
        .await
    {
        Ok(version) => {
            diagnostics.success = true;
            diagnostics.server_version = version;
        }
        Err(e) => diagnostics.errors.push(format!("server version: {}", e)),
    }

    match executor
        .run("vector_extension", |db| async move { vector_extension_installed(&db).await })
        .await
    {
        Ok(installed) => diagnostics.vector_extension = installed,
        Err(e) => diagnostics.errors.push(format!("vector extension: {}", e)),
    }

    match executor
        .run("table_exists", |db| async move { table_exists(&db, table).await })
        .await
    {
        Ok(exists) => diagnostics.table_exists = exists,
        Err(e) => diagnostics.errors.push(format!("table lookup: {}", e)),
    }

    if diagnostics.table_exists {
        match executor
            .run("row_count", |db| async move { row_count(&db, table).await })
            .await
        {
            Ok(count) => diagnostics.document_count = Some(count),
            Err(e) => diagnostics.errors.push(format!("row count: {}", e)),
        }
    }

    if !diagnostics.errors.is_empty() {
        warn!(errors = ?diagnostics.errors, "Connection test reported problems");
    }
    diagnostics
}

pub(crate) async fn check_table_schema<C>(
    executor: &RetryExecutor<C>,
    table: &str,
) -> VectorResult<SchemaReport>
where
    C: PoolConnector<Pool = DatabaseConnection>,
{
    info!(table, "Checking table schema");

    let exists = executor
        .run("table_exists", |db| async move { table_exists(&db, table).await })
        .await?;

    if !exists {
        return Ok(SchemaReport {
            table_exists: false,
            columns: BTreeMap::new(),
            needs_corrections: vec![format!("Table '{}' does not exist.", table)],
        });
    }

    let columns = executor
        .run("table_columns", |db| async move { table_columns(&db, table).await })
        .await?;
    let needs_corrections = schema_corrections(&columns);

    Ok(SchemaReport {
        table_exists: true,
        columns,
        needs_corrections,
    })
}
