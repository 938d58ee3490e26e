use crate::state::AppState;
use axum::{Router, routing::get};
use std::sync::Arc;

pub mod chat;
pub mod health;
pub mod sites;

/// All application routes. Authentication is layered on by the caller.
pub fn routes(state: &AppState) -> Router {
    Router::new()
        .route("/sites", get(sites::list_sites))
        .route("/chat/ws/{conversation}", get(chat::chat_ws))
        .with_state(state.clone())
        .nest("/api", domain_vector::router(Arc::clone(&state.vector)))
        .merge(domain_auth::router(state.gateway.clone()))
}

/// Readiness probe checking the vector store and the ticket store
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
