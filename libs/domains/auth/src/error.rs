use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::DatabaseError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API key is missing")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    /// Unknown, expired or already consumed ticket
    #[error("Invalid or expired ticket")]
    InvalidTicket,

    /// The identity store or ticket store cannot be reached
    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingApiKey | AuthError::InvalidApiKey | AuthError::InvalidTicket => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Unavailable(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message sent to clients; internal details stay in the logs
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingApiKey => "API key is missing",
            AuthError::InvalidApiKey => "Invalid API key",
            AuthError::InvalidTicket => "Invalid or expired ticket",
            AuthError::Unavailable(_) | AuthError::Internal(_) => "Internal server error",
        }
    }
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Transient(_) | DatabaseError::PoolClosed => {
                AuthError::Unavailable(err.to_string())
            }
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        DatabaseError::from(err).into()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AuthError::Unavailable(details) | AuthError::Internal(details) => {
                tracing::error!(details = %details, "Authentication failed internally");
            }
            _ => tracing::debug!(reason = %self, "Authentication rejected"),
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_key_body() {
        let (status, body) = body_json(AuthError::MissingApiKey).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "API key is missing"}));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) =
            body_json(AuthError::Internal("relation \"sites\" does not exist".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[test]
    fn test_database_errors_classified() {
        assert!(matches!(
            AuthError::from(DatabaseError::Transient("reset".into())),
            AuthError::Unavailable(_)
        ));
        assert!(matches!(
            AuthError::from(DatabaseError::Query("syntax".into())),
            AuthError::Internal(_)
        ));
    }
}
