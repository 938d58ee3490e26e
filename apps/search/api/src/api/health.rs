//! Readiness checks against the vector store and the ticket store.

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};

pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        (
            "vector_db",
            Box::pin(async {
                let diagnostics = state.vector.test_connection().await;
                if diagnostics.success && diagnostics.table_exists {
                    Ok(())
                } else {
                    Err(diagnostics.errors.join("; "))
                }
            }),
        ),
        (
            "tickets",
            Box::pin(async {
                state
                    .tickets
                    .check_health()
                    .await
                    .map_err(|e| format!("Ticket store ping failed: {}", e))
            }),
        ),
    ];

    match run_health_checks(checks).await {
        Ok((status, json)) => (status, json).into_response(),
        Err((status, json)) => (status, json).into_response(),
    }
}
