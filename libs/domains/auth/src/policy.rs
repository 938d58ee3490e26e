use std::collections::HashSet;

/// How the gateway treats a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No credentials needed
    Public,
    /// The handler authenticates on its own (websocket upgrades, ticket issuance)
    Deferred,
    /// Requires a valid `X-API-Key`
    Protected,
}

/// Which paths bypass API key authentication.
///
/// Public paths match exactly; prefixes match the start of the path.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    public_paths: HashSet<String>,
    public_prefixes: Vec<String>,
    deferred_paths: HashSet<String>,
    deferred_prefixes: Vec<String>,
}

pub const TICKET_PATH: &str = "/api/auth/ws-ticket";
pub const WEBSOCKET_PREFIX: &str = "/chat/ws/";

const DEFAULT_PUBLIC_PATHS: [&str; 10] = [
    "/",
    "/health",
    "/ready",
    "/oauth/callback",
    "/api/oauth/config",
    "/who",
    "/sites",
    "/config",
    "/chat",
    "/favicon.ico",
];

const DEFAULT_PUBLIC_PREFIXES: [&str; 2] = ["/static/", "/html/"];

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            public_prefixes: DEFAULT_PUBLIC_PREFIXES.iter().map(|p| p.to_string()).collect(),
            deferred_paths: HashSet::from([TICKET_PATH.to_string()]),
            deferred_prefixes: vec![WEBSOCKET_PREFIX.to_string()],
        }
    }
}

impl AuthPolicy {
    /// Policy that protects every path
    pub fn strict() -> Self {
        Self {
            public_paths: HashSet::new(),
            public_prefixes: Vec::new(),
            deferred_paths: HashSet::new(),
            deferred_prefixes: Vec::new(),
        }
    }

    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.insert(path.into());
        self
    }

    pub fn with_public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_prefixes.push(prefix.into());
        self
    }

    pub fn with_deferred_path(mut self, path: impl Into<String>) -> Self {
        self.deferred_paths.insert(path.into());
        self
    }

    pub fn with_deferred_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.deferred_prefixes.push(prefix.into());
        self
    }

    pub fn access(&self, path: &str) -> Access {
        if self.deferred_paths.contains(path)
            || self.deferred_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        {
            return Access::Deferred;
        }
        if self.public_paths.contains(path)
            || self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        {
            return Access::Public;
        }
        Access::Protected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_public_paths() {
        let policy = AuthPolicy::default();
        for path in DEFAULT_PUBLIC_PATHS {
            assert_eq!(policy.access(path), Access::Public, "{path}");
        }
        assert_eq!(policy.access("/static/app.js"), Access::Public);
        assert_eq!(policy.access("/html/index.html"), Access::Public);
    }

    #[test]
    fn test_public_paths_match_exactly() {
        let policy = AuthPolicy::default();
        // "/" must not open up every path, nor "/sites" its children
        assert_eq!(policy.access("/api/search"), Access::Protected);
        assert_eq!(policy.access("/sites/export"), Access::Protected);
        assert_eq!(policy.access("/healthz"), Access::Protected);
        assert_eq!(policy.access("/static"), Access::Protected);
    }

    #[test]
    fn test_deferred_paths() {
        let policy = AuthPolicy::default();
        assert_eq!(policy.access("/chat/ws/abc"), Access::Deferred);
        assert_eq!(policy.access(TICKET_PATH), Access::Deferred);
        assert_eq!(policy.access("/chat/wsx"), Access::Protected);
    }

    #[test]
    fn test_strict_policy_with_additions() {
        let policy = AuthPolicy::strict()
            .with_public_path("/health")
            .with_public_prefix("/assets/");
        assert_eq!(policy.access("/health"), Access::Public);
        assert_eq!(policy.access("/assets/logo.png"), Access::Public);
        assert_eq!(policy.access("/"), Access::Protected);
        assert_eq!(policy.access("/chat/ws/1"), Access::Protected);
    }
}
