use axum::middleware;
use axum_helpers::server::{create_production_app, create_router, health_router, with_common_layers};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_auth::{AuthGateway, AuthPolicy, PgCredentialResolver, TicketStore, auth_middleware};
use domain_vector::{OpenAIProvider, VectorStoreClient};
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    // Pools open lazily on first use; nothing here touches the network
    let provider = Arc::new(OpenAIProvider::from_env()?);
    let vector = Arc::new(VectorStoreClient::from_env(provider)?);
    let resolver = Arc::new(PgCredentialResolver::connect_lazy(&config.main_db));

    // Falls back to process memory when Redis is absent or unreachable
    let tickets = Arc::new(TicketStore::connect(config.redis.clone()).await);
    info!(backend = tickets.backend_name(), "Ticket store ready");

    let gateway = AuthGateway::new(resolver.clone(), Arc::clone(&tickets), AuthPolicy::default());

    let state = AppState {
        config,
        vector,
        resolver,
        tickets,
        gateway,
    };

    // create_router adds the OpenAPI document and the JSON 404 fallback;
    // the auth layer goes on afterwards so it also covers the fallback.
    let router = create_router::<openapi::ApiDoc>(api::routes(&state))
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()))
        .layer(middleware::from_fn_with_state(
            state.gateway.clone(),
            auth_middleware,
        ));
    let app = with_common_layers(router);

    info!(
        "Starting search API with production-ready shutdown ({:?} timeout)",
        state.config.server.shutdown_timeout
    );

    let server_config = state.config.server.clone();
    create_production_app(app, &server_config, server_config.shutdown_timeout, async move {
        info!("Shutting down: closing database pools");

        tokio::join!(
            async {
                match state.vector.close().await {
                    Ok(_) => info!("Vector store pool closed"),
                    Err(e) => tracing::error!("Error closing vector store pool: {}", e),
                }
            },
            async {
                match state.resolver.close().await {
                    Ok(_) => info!("Main database pool closed"),
                    Err(e) => tracing::error!("Error closing main database pool: {}", e),
                }
            }
        );
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Search API shutdown complete");
    Ok(())
}
