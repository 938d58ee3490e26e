//! Shared application state passed to the app's own handlers.

use std::sync::Arc;

use domain_auth::{AuthGateway, PgCredentialResolver, TicketStore};
use domain_vector::VectorStoreClient;

#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// Vector store facade (lazy pool, retries)
    pub vector: Arc<VectorStoreClient>,
    /// API key lookup against the main database
    pub resolver: Arc<PgCredentialResolver>,
    pub tickets: Arc<TicketStore>,
    pub gateway: AuthGateway,
}
