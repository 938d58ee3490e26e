//! Websocket search sessions.
//!
//! The upgrade request carries a ticket from `POST /api/auth/ws-ticket`
//! instead of an API key. Every text frame is a query against the ticket's
//! site; the reply is the JSON list of results.

use crate::state::AppState;
use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use domain_auth::{AuthError, Identity};
use domain_vector::SiteScope;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct TicketQuery {
    pub ticket: Option<String>,
}

pub async fn chat_ws(
    State(state): State<AppState>,
    Path(conversation): Path<String>,
    Query(query): Query<TicketQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = query.ticket.filter(|t| !t.is_empty()) else {
        return AuthError::InvalidTicket.into_response();
    };

    match state.gateway.redeem_ticket(&ticket).await {
        Ok(identity) => {
            info!(%conversation, site = %identity.site, "Websocket session authorized");
            ws.on_upgrade(move |socket| session(socket, state, identity, conversation))
        }
        Err(e) => e.into_response(),
    }
}

async fn session(mut socket: WebSocket, state: AppState, identity: Identity, conversation: String) {
    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                debug!(%conversation, error = %e, "Websocket receive failed");
                break;
            }
        };

        let query = match message {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match state
            .vector
            .search(&query, SiteScope::Specific(identity.site_id))
            .await
        {
            Ok(results) => json!({ "results": results }),
            Err(e) => {
                warn!(%conversation, error = %e, "Websocket search failed");
                json!({ "error": "Search failed" })
            }
        };

        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            break;
        }
    }

    info!(%conversation, "Websocket session closed");
}
