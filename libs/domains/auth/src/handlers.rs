use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::error::AuthResult;
use crate::gateway::AuthGateway;
use crate::policy::TICKET_PATH;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketResponse {
    pub ticket: String,
}

/// Exchange an API key for a single-use websocket ticket
#[utoipa::path(
    post,
    path = "/api/auth/ws-ticket",
    tag = "auth",
    params(("X-API-Key" = String, Header, description = "Site API key")),
    responses(
        (status = 200, description = "Ticket issued", body = TicketResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Identity or ticket store unavailable")
    )
)]
pub async fn create_ws_ticket(
    State(gateway): State<AuthGateway>,
    headers: HeaderMap,
) -> AuthResult<Json<TicketResponse>> {
    let ticket = gateway.issue_ticket(&headers).await?;
    Ok(Json(TicketResponse {
        ticket: ticket.ticket_id,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(create_ws_ticket),
    components(schemas(TicketResponse)),
    tags((name = "auth", description = "API key authentication and websocket tickets"))
)]
pub struct AuthApiDoc;

pub fn router(gateway: AuthGateway) -> Router {
    Router::new()
        .route(TICKET_PATH, post(create_ws_ticket))
        .with_state(gateway)
}
