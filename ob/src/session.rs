//! Anonymous session token storage

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

/// A bearer token and the instant it stops being accepted
///
/// Token and expiry always travel together; stores replace the whole value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Usable iff non-empty and strictly unexpired at `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && self.expires_at > now
    }
}

// Never print the token itself
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds the current anonymous session token
pub trait SessionTokenStore: Send + Sync {
    /// Current token and expiry, if any
    fn current(&self) -> Option<SessionToken>;

    /// Replace token and expiry together
    fn set(&self, token: String, expires_at: DateTime<Utc>);

    /// Remove token and expiry together
    fn clear(&self);

    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.current().is_some_and(|t| t.is_valid(now))
    }

    /// The token string, if it is usable at `now`
    fn valid_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.current().filter(|t| t.is_valid(now)).map(|t| t.token)
    }
}

/// Process-lifetime token store
#[derive(Debug, Default)]
pub struct InMemorySessionTokenStore {
    inner: Mutex<Option<SessionToken>>,
}

impl InMemorySessionTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token
    pub fn with_token(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(Some(SessionToken::new(token, expires_at))),
        }
    }
}

impl SessionTokenStore for InMemorySessionTokenStore {
    fn current(&self) -> Option<SessionToken> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, token: String, expires_at: DateTime<Utc>) {
        debug!(%expires_at, "InMemorySessionTokenStore::set: called");
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(SessionToken { token, expires_at });
    }

    fn clear(&self) {
        debug!("InMemorySessionTokenStore::clear: called");
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
