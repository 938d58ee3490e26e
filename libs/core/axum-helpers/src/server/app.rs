use super::shutdown::{ShutdownCoordinator, coordinated_shutdown};
use crate::errors::handlers::not_found;
use axum::{Json, Router, routing::get};
use core_config::server::ServerConfig;
use std::io;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;

/// Path the OpenAPI document is served from
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Adds the OpenAPI document and the JSON 404 fallback to `routes`.
///
/// Layers applied to the returned router afterwards (authentication, for
/// instance) also cover the fallback, so unknown paths are gated like known ones.
///
/// # Example
/// ```ignore
/// #[derive(OpenApi)]
/// #[openapi(paths(search_handler))]
/// struct ApiDoc;
///
/// let router = create_router::<ApiDoc>(routes).layer(auth_layer);
/// let app = with_common_layers(router);
/// ```
pub fn create_router<T>(routes: Router) -> Router
where
    T: OpenApi + 'static,
{
    let document = T::openapi();

    routes
        .route(OPENAPI_PATH, get(move || async move { Json(document) }))
        .fallback(not_found)
}

/// Request tracing and response compression (gzip, br, deflate, zstd)
pub fn with_common_layers(router: Router) -> Router {
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
}

/// Serve `router` until SIGINT/SIGTERM, then run `cleanup` within `shutdown_timeout`.
///
/// # Example
/// ```ignore
/// let cleanup = async move {
///     vector_client.close().await.ok();
/// };
///
/// create_production_app(router, &config, Duration::from_secs(30), cleanup).await?;
/// ```
pub async fn create_production_app<F>(
    router: Router,
    server_config: &ServerConfig,
    shutdown_timeout: Duration,
    cleanup: F,
) -> io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let (coordinator, _rx) = ShutdownCoordinator::new();
    let shutdown_handle = coordinator.clone();

    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let cleanup_handle = tokio::spawn(async move {
        shutdown_handle.wait_for_signal().await;

        info!("Starting cleanup tasks (timeout: {:?})", shutdown_timeout);
        match tokio::time::timeout(shutdown_timeout, cleanup).await {
            Ok(_) => info!("Cleanup completed successfully"),
            Err(_) => {
                tracing::warn!(
                    "Cleanup exceeded timeout of {:?}, forcing shutdown",
                    shutdown_timeout
                );
            }
        }
    });

    let serve_result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(coordinated_shutdown(coordinator.clone()))
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        });

    // Unblock the cleanup task when the server stopped on its own
    coordinator.shutdown();
    cleanup_handle.await.ok();

    serve_result
}
