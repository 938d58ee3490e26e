use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// The site an API key (or a ticket issued for it) belongs to.
///
/// Stored as JSON in the ticket store; unknown fields are rejected so a
/// tampered or foreign payload never decodes into an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub site_id: Uuid,
    /// Textual form of `site_id`
    pub site: String,
}

impl Identity {
    pub fn new(site_id: Uuid) -> Self {
        Self {
            site_id,
            site: site_id.to_string(),
        }
    }
}

impl From<Uuid> for Identity {
    fn from(site_id: Uuid) -> Self {
        Self::new(site_id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site:{}", self.site)
    }
}
