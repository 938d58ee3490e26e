use crate::state::AppState;
use axum::{Json, extract::State};
use axum_helpers::AppError;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct SitesResponse {
    pub sites: Vec<Uuid>,
}

/// Sites that have at least one indexed document
#[utoipa::path(
    get,
    path = "/sites",
    tag = "sites",
    responses(
        (status = 200, description = "Distinct site ids", body = SitesResponse),
        (status = 503, description = "Vector store unavailable")
    )
)]
pub async fn list_sites(State(state): State<AppState>) -> Result<Json<SitesResponse>, AppError> {
    let sites = state
        .vector
        .get_sites()
        .await
        .ok_or_else(|| AppError::ServiceUnavailable("Site list is unavailable".to_string()))?;

    Ok(Json(SitesResponse {
        sites: sites.into_iter().collect(),
    }))
}
