//! Pull-based auth token source.

/// Supplies the credential appended to every stream URL.
///
/// The token is pulled fresh on every connection attempt, never cached across
/// reconnects, so a just-refreshed token is always the one used. Returning
/// `None` (or an empty string) makes the attempt fail as a configuration
/// error rather than entering a retry loop.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Fixed token provider for tests, examples, and long-lived API keys.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
