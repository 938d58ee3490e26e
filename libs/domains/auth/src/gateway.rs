use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::policy::{Access, AuthPolicy};
use crate::resolver::CredentialResolver;
use crate::ticket::{Ticket, TicketStore};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticates requests by API key and hands out websocket tickets.
///
/// # Example
///
/// ```ignore
/// let gateway = AuthGateway::new(resolver, tickets, AuthPolicy::default());
///
/// let app = Router::new()
///     .merge(domain_auth::router(gateway.clone()))
///     .layer(axum::middleware::from_fn_with_state(gateway, auth_middleware));
/// ```
#[derive(Clone)]
pub struct AuthGateway {
    resolver: Arc<dyn CredentialResolver>,
    tickets: Arc<TicketStore>,
    policy: Arc<AuthPolicy>,
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

impl AuthGateway {
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        tickets: Arc<TicketStore>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            resolver,
            tickets,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    pub fn tickets(&self) -> &TicketStore {
        &self.tickets
    }

    /// Resolve the `X-API-Key` header into an identity
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Identity> {
        let key = api_key(headers).ok_or(AuthError::MissingApiKey)?;
        self.resolver
            .resolve(key)
            .await?
            .ok_or(AuthError::InvalidApiKey)
    }

    /// Authenticate by API key and issue a ticket for the resulting identity
    pub async fn issue_ticket(&self, headers: &HeaderMap) -> AuthResult<Ticket> {
        let identity = self.authenticate(headers).await?;
        self.tickets.issue(&identity).await
    }

    /// Consume a ticket presented on a websocket upgrade
    pub async fn redeem_ticket(&self, ticket: &str) -> AuthResult<Identity> {
        self.tickets
            .consume(ticket)
            .await?
            .ok_or(AuthError::InvalidTicket)
    }
}

/// API key middleware.
///
/// Public paths pass untouched, deferred paths are left to their handlers and
/// everything else needs a resolvable `X-API-Key`. The resolved [`Identity`]
/// is inserted into the request extensions.
pub async fn auth_middleware(
    State(gateway): State<AuthGateway>,
    mut request: Request,
    next: Next,
) -> Response {
    match gateway.policy.access(request.uri().path()) {
        Access::Public | Access::Deferred => next.run(request).await,
        Access::Protected => match gateway.authenticate(request.headers()).await {
            Ok(identity) => {
                debug!(site = %identity.site, "Request authenticated");
                request.extensions_mut().insert(identity);
                next.run(request).await
            }
            Err(e) => e.into_response(),
        },
    }
}
