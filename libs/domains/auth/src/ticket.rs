//! Short-lived, single-use tickets for websocket authentication.
//!
//! Browsers cannot attach `X-API-Key` to a websocket upgrade, so a client
//! trades its key for a ticket over plain HTTP first and passes the ticket in
//! the upgrade URL. A ticket is redeemable once.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use database::redis::{ConnectionManager, RedisConfig, connect_with_retry};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;

pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(30);

const KEY_PREFIX: &str = "ws_ticket:";

// GET and DEL in one round trip so two racers can never both read the value.
const CONSUME_SCRIPT: &str = r"
local value = redis.call('GET', KEYS[1])
if value then
    redis.call('DEL', KEYS[1])
end
return value
";

/// A freshly issued ticket
#[derive(Debug, Clone)]
pub struct Ticket {
    pub ticket_id: String,
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct MemoryEntry {
    identity: Identity,
    expires_at: Instant,
}

enum Backend {
    Redis(ConnectionManager),
    Memory(Mutex<HashMap<String, MemoryEntry>>),
}

/// Ticket storage backed by Redis when reachable, otherwise by process memory.
///
/// The in-memory fallback only works for a single server instance.
pub struct TicketStore {
    backend: Backend,
    ttl: Duration,
}

impl TicketStore {
    pub fn memory() -> Self {
        info!("Ticket store using in-memory backend");
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
            ttl: DEFAULT_TICKET_TTL,
        }
    }

    pub fn redis(conn: ConnectionManager) -> Self {
        info!("Ticket store using Redis backend");
        Self {
            backend: Backend::Redis(conn),
            ttl: DEFAULT_TICKET_TTL,
        }
    }

    /// Pick a backend: `explicit` URL, then `REDIS_URL`, then LocalStack's
    /// Redis, then memory. A Redis that cannot be reached also means memory.
    pub async fn connect(explicit: Option<RedisConfig>) -> Self {
        let Some(config) = explicit.or_else(RedisConfig::discover) else {
            return Self::memory();
        };

        match connect_with_retry(&config, None).await {
            Ok(conn) => Self::redis(conn),
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis for tickets, falling back to in-memory store");
                Self::memory()
            }
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        }
    }

    /// Issue a ticket for `identity` with the store's TTL
    pub async fn issue(&self, identity: &Identity) -> AuthResult<Ticket> {
        self.issue_with_ttl(identity, self.ttl).await
    }

    pub async fn issue_with_ttl(&self, identity: &Identity, ttl: Duration) -> AuthResult<Ticket> {
        let ticket_id = Uuid::new_v4().to_string();

        match &self.backend {
            Backend::Redis(conn) => {
                let payload = serde_json::to_string(identity)
                    .map_err(|e| AuthError::Internal(e.to_string()))?;
                let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                let mut conn = conn.clone();
                let _: () = conn
                    .pset_ex(format!("{KEY_PREFIX}{ticket_id}"), payload, ttl_ms)
                    .await?;
            }
            Backend::Memory(entries) => {
                let now = Instant::now();
                let mut entries = entries.lock().await;
                entries.retain(|_, entry| entry.expires_at > now);
                entries.insert(
                    ticket_id.clone(),
                    MemoryEntry {
                        identity: identity.clone(),
                        expires_at: now + ttl,
                    },
                );
            }
        }

        let issued_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        debug!(site = %identity.site, ttl_ms = ttl.as_millis() as u64, "Issued ticket");

        Ok(Ticket {
            ticket_id,
            identity: identity.clone(),
            issued_at,
            expires_at,
        })
    }

    /// Redeem a ticket. `None` for unknown, expired or already used tickets.
    pub async fn consume(&self, ticket_id: &str) -> AuthResult<Option<Identity>> {
        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                let script = redis::Script::new(CONSUME_SCRIPT);
                let payload: Option<String> = script
                    .key(format!("{KEY_PREFIX}{ticket_id}"))
                    .invoke_async(&mut conn)
                    .await?;

                Ok(payload.and_then(|raw| match serde_json::from_str::<Identity>(&raw) {
                    Ok(identity) => Some(identity),
                    Err(e) => {
                        warn!(error = %e, "Discarding undecodable ticket payload");
                        None
                    }
                }))
            }
            Backend::Memory(entries) => {
                let entry = entries.lock().await.remove(ticket_id);
                Ok(entry
                    .filter(|entry| Instant::now() < entry.expires_at)
                    .map(|entry| entry.identity))
            }
        }
    }

    /// `PING` the Redis backend; the memory backend is always healthy
    pub async fn check_health(&self) -> AuthResult<()> {
        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                database::redis::check_health(&mut conn).await?;
                Ok(())
            }
            Backend::Memory(_) => Ok(()),
        }
    }

    /// Number of tickets held in memory, expired ones included; `None` for Redis
    pub async fn pending_in_memory(&self) -> Option<usize> {
        match &self.backend {
            Backend::Redis(_) => None,
            Backend::Memory(entries) => Some(entries.lock().await.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_issue_then_consume_once() {
        let store = TicketStore::memory();
        let identity = identity();

        let ticket = store.issue(&identity).await.unwrap();
        assert!(Uuid::parse_str(&ticket.ticket_id).is_ok());
        assert_eq!(store.consume(&ticket.ticket_id).await.unwrap(), Some(identity));
        assert_eq!(store.consume(&ticket.ticket_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_backend_is_healthy() {
        assert!(TicketStore::memory().check_health().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let store = TicketStore::memory();
        assert_eq!(store.consume("not-a-ticket").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_ticket_not_found() {
        let store = TicketStore::memory().with_ttl(Duration::from_secs(30));
        let ticket = store.issue(&identity()).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.consume(&ticket.ticket_id).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_issue_sweeps_expired_entries() {
        let store = TicketStore::memory();
        store
            .issue_with_ttl(&identity(), Duration::from_secs(1))
            .await
            .unwrap();
        store
            .issue_with_ttl(&identity(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.pending_in_memory().await, Some(2));

        tokio::time::advance(Duration::from_secs(2)).await;
        store.issue(&identity()).await.unwrap();
        assert_eq!(store.pending_in_memory().await, Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_consumers_single_winner() {
        let store = Arc::new(TicketStore::memory());
        let ticket = store.issue(&identity()).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = ticket.ticket_id.clone();
                tokio::spawn(async move { store.consume(&id).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_bad_redis_url_falls_back_to_memory() {
        let store = TicketStore::connect(Some(RedisConfig::new("not-a-redis-url"))).await;
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_expiry_timestamps() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let ticket = rt
            .block_on(TicketStore::memory().issue(&identity()))
            .unwrap();
        assert_eq!(
            ticket.expires_at - ticket.issued_at,
            chrono::Duration::seconds(30)
        );
    }
}
