//! REST handlers for the vector store. Every route expects the caller's
//! [`Identity`] in the request extensions, put there by the auth gateway.

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use axum_helpers::AppError;
use domain_auth::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::client::VectorStoreClient;
use crate::error::VectorResult;
use crate::models::{DistanceMetric, DocumentInput, DocumentMatch, SimilarityResult, SiteScope};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    /// Search every site instead of the caller's own
    #[serde(default)]
    pub all_sites: bool,
    pub num_results: Option<u64>,
    pub metric: Option<DistanceMetric>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SimilarityResult>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadRequest {
    pub documents: Vec<DocumentInput>,
    /// Documents per statement, 1 to 8191
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadResponse {
    pub uploaded: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

type SharedClient = Arc<VectorStoreClient>;

/// Similarity search over the caller's site, or all sites on request
#[utoipa::path(
    post,
    path = "/search",
    tag = "vector",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked results, closest first", body = SearchResponse),
        (status = 400, description = "Empty query"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 502, description = "Embedding provider failed"),
        (status = 503, description = "Database unavailable")
    )
)]
pub async fn search(
    State(client): State<SharedClient>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<SearchRequest>,
) -> VectorResult<Json<SearchResponse>> {
    let scope = if request.all_sites {
        SiteScope::All
    } else {
        SiteScope::Specific(identity.site_id)
    };

    let results = client
        .search_with(
            &request.query,
            scope,
            request.num_results.unwrap_or(client.config().num_results),
            request.metric.unwrap_or(client.config().metric),
        )
        .await?;

    Ok(Json(SearchResponse { results }))
}

/// Upsert documents for the caller's site
///
/// `site_id` of every document is replaced by the caller's site.
#[utoipa::path(
    post,
    path = "/documents",
    tag = "vector",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Rows inserted or updated", body = UploadResponse),
        (status = 400, description = "Batch size out of range"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 503, description = "Database unavailable")
    )
)]
pub async fn upload_documents(
    State(client): State<SharedClient>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<UploadRequest>,
) -> VectorResult<Json<UploadResponse>> {
    let site = identity.site_id.to_string();
    let documents = request
        .documents
        .into_iter()
        .map(|mut doc| {
            doc.site_id = Some(site.clone());
            doc
        })
        .collect();

    let uploaded = match request.batch_size {
        Some(batch_size) => client.upload_documents_in_batches(documents, batch_size).await?,
        None => client.upload_documents(documents).await?,
    };

    Ok(Json(UploadResponse { uploaded }))
}

/// Delete every document of the caller's site
#[utoipa::path(
    delete,
    path = "/documents",
    tag = "vector",
    responses(
        (status = 200, description = "Rows deleted", body = DeleteResponse),
        (status = 401, description = "Missing or invalid API key")
    )
)]
pub async fn delete_documents(
    State(client): State<SharedClient>,
    Extension(identity): Extension<Identity>,
) -> VectorResult<Json<DeleteResponse>> {
    let deleted = client.delete_documents_by_site(identity.site_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Find a document of the caller's site whose URL contains `url`
#[utoipa::path(
    get,
    path = "/documents/by-url",
    tag = "vector",
    params(("url" = String, Query, description = "Case-insensitive URL fragment")),
    responses(
        (status = 200, description = "Matching document", body = DocumentMatch),
        (status = 404, description = "No document matches")
    )
)]
pub async fn find_by_url(
    State(client): State<SharedClient>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<UrlQuery>,
) -> Result<Json<DocumentMatch>, AppError> {
    client
        .search_by_url(&params.url, identity.site_id)
        .await
        .map_err(AppError::from)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No document matches '{}'", params.url)))
}

#[derive(OpenApi)]
#[openapi(
    paths(search, upload_documents, delete_documents, find_by_url),
    components(schemas(
        SearchRequest, SearchResponse, UploadRequest, UploadResponse, DeleteResponse,
        DocumentInput, DocumentMatch, SimilarityResult, DistanceMetric
    )),
    tags((name = "vector", description = "Site-scoped document storage and similarity search"))
)]
pub struct VectorApiDoc;

/// Routes relative to the mount point (the app nests them under `/api`)
pub fn router(client: SharedClient) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/documents", post(upload_documents).delete(delete_documents))
        .route("/documents/by-url", get(find_by_url))
        .with_state(client)
}
