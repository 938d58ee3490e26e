//! Auth Domain
//!
//! API key authentication for site-scoped requests plus the single-use
//! ticket handoff used by websocket connections.
//!
//! ```text
//! client ── X-API-Key ──► AuthGateway ──► CredentialResolver (sites table)
//!    │                         │
//!    │  POST /api/auth/ws-ticket
//!    │◄──── { "ticket" } ──────┤──► TicketStore (Redis, or memory)
//!    │                         │
//!    └── /chat/ws/{id}?ticket= ─► redeem_ticket (atomic GET + DEL)
//! ```

pub mod error;
pub mod gateway;
pub mod handlers;
pub mod identity;
pub mod policy;
pub mod resolver;
pub mod ticket;

pub use error::{AuthError, AuthResult};
pub use gateway::{API_KEY_HEADER, AuthGateway, auth_middleware};
pub use handlers::{AuthApiDoc, TicketResponse, router};
pub use identity::Identity;
pub use policy::{Access, AuthPolicy, TICKET_PATH, WEBSOCKET_PREFIX};
pub use resolver::{CredentialResolver, MainDbConfig, PgCredentialResolver};
#[cfg(any(test, feature = "mocks"))]
pub use resolver::MockCredentialResolver;
pub use ticket::{DEFAULT_TICKET_TTL, Ticket, TicketStore};
