use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use core_config::ConfigError;
use database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    /// A single document or request failed validation
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type VectorResult<T> = Result<T, VectorError>;

impl From<reqwest::Error> for VectorError {
    fn from(err: reqwest::Error) -> Self {
        VectorError::Embedding(err.to_string())
    }
}

impl From<ConfigError> for VectorError {
    fn from(err: ConfigError) -> Self {
        VectorError::Config(err.to_string())
    }
}

impl From<sea_orm::DbErr> for VectorError {
    fn from(err: sea_orm::DbErr) -> Self {
        VectorError::Database(err.into())
    }
}

/// Convert VectorError to AppError for standardized HTTP error responses.
///
/// Only validation messages reach the client verbatim.
impl From<VectorError> for AppError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Validation(msg) => AppError::BadRequest(msg),
            VectorError::Embedding(msg) => AppError::Upstream(msg),
            VectorError::Config(msg) => {
                tracing::error!("Vector store configuration error: {}", msg);
                AppError::InternalServerError("Vector store is misconfigured".to_string())
            }
            VectorError::Database(DatabaseError::Transient(msg)) => {
                AppError::DatabaseUnavailable(msg)
            }
            VectorError::Database(DatabaseError::PoolClosed) => AppError::DatabasePoolClosed,
            VectorError::Database(other) => AppError::Database(other.to_string()),
        }
    }
}

impl IntoResponse for VectorError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
