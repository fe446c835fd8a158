//! Session registry — tracks which bearer tokens belong to which account.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use can_types::{AccountId, Timestamp};

use crate::SessionError;

/// Random bytes per token (rendered as 64 hex characters).
pub const TOKEN_BYTES: usize = 32;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// An opaque bearer token.
///
/// `Debug` prints only a short prefix so tokens do not end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Draw a fresh token from the operating system's RNG.
    pub fn generate() -> Result<Self, SessionError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| SessionError::TokenGeneration(e.to_string()))?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Accept a caller-supplied token (from a header or config file).
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > 256 || !raw.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(SessionError::MalformedToken);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}

/// A signed-in account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: SessionToken,
    pub account: AccountId,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Changes announced by the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut {
        token: SessionToken,
        account: AccountId,
    },
    TokenRefreshed(Session),
}

impl SessionEvent {
    pub fn token(&self) -> &SessionToken {
        match self {
            Self::SignedIn(s) | Self::TokenRefreshed(s) => &s.token,
            Self::SignedOut { token, .. } => token,
        }
    }
}

/// Maps bearer tokens to sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionToken, Session>>,
    ttl_secs: u64,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_secs,
            events,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a new token for `account`.
    pub fn sign_in(&self, account: AccountId, now: Timestamp) -> Result<Session, SessionError> {
        let token = SessionToken::generate()?;
        Ok(self.sign_in_with_token(account, token, now))
    }

    /// Register a known token, e.g. a development session from the config.
    /// An existing session under the same token is replaced.
    pub fn sign_in_with_token(
        &self,
        account: AccountId,
        token: SessionToken,
        now: Timestamp,
    ) -> Session {
        let session = Session {
            token: token.clone(),
            account,
            issued_at: now,
            expires_at: now.plus_secs(self.ttl_secs),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, session.clone());
        tracing::debug!(account = %session.account, "session opened");
        self.publish(SessionEvent::SignedIn(session.clone()));
        session
    }

    /// Look up a token. Expired sessions are dropped on sight.
    pub fn resolve(&self, token: &SessionToken, now: Timestamp) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(SessionError::UnknownToken)?;
        if session.is_expired(now) {
            self.remove(token);
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// Push the expiry of a live session out by one TTL from `now`.
    pub fn refresh(&self, token: &SessionToken, now: Timestamp) -> Result<Session, SessionError> {
        let refreshed = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            match sessions.get_mut(token) {
                None => return Err(SessionError::UnknownToken),
                Some(session) if session.is_expired(now) => None,
                Some(session) => {
                    session.expires_at = now.plus_secs(self.ttl_secs);
                    Some(session.clone())
                }
            }
        };
        let Some(refreshed) = refreshed else {
            self.remove(token);
            return Err(SessionError::Expired);
        };
        self.publish(SessionEvent::TokenRefreshed(refreshed.clone()));
        Ok(refreshed)
    }

    /// Revoke a token. Returns whether it was known.
    pub fn sign_out(&self, token: &SessionToken) -> bool {
        self.remove(token).is_some()
    }

    /// Drop every session that has expired by `now`.
    pub fn purge_expired(&self, now: Timestamp) -> usize {
        let expired: Vec<SessionToken> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.token.clone())
            .collect();
        expired
            .iter()
            .filter(|token| self.remove(token).is_some())
            .count()
    }

    pub fn count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn remove(&self, token: &SessionToken) -> Option<Session> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)?;
        tracing::debug!(account = %removed.account, "session closed");
        self.publish(SessionEvent::SignedOut {
            token: removed.token.clone(),
            account: removed.account.clone(),
        });
        Some(removed)
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice").unwrap()
    }

    #[test]
    fn generated_tokens_are_hex_and_distinct() {
        let a = SessionToken::generate().unwrap();
        let b = SessionToken::generate().unwrap();
        assert_eq!(a.as_str().len(), TOKEN_BYTES * 2);
        assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert!(!format!("{a:?}").contains(a.as_str()));
    }

    #[test]
    fn sign_in_then_resolve() {
        let registry = SessionRegistry::new(3_600);
        let session = registry.sign_in(alice(), Timestamp::new(100)).unwrap();
        assert_eq!(session.expires_at, Timestamp::new(3_700));
        assert_eq!(
            registry.resolve(&session.token, Timestamp::new(200)).unwrap(),
            session
        );
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unknown_and_malformed_tokens() {
        let registry = SessionRegistry::new(60);
        let token = SessionToken::parse("nope").unwrap();
        assert_eq!(
            registry.resolve(&token, Timestamp::new(0)),
            Err(SessionError::UnknownToken)
        );
        assert_eq!(SessionToken::parse("  "), Err(SessionError::MalformedToken));
        assert_eq!(
            SessionToken::parse("has space"),
            Err(SessionError::MalformedToken)
        );
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let registry = SessionRegistry::new(10);
        let session = registry.sign_in(alice(), Timestamp::new(0)).unwrap();
        assert_eq!(
            registry.resolve(&session.token, Timestamp::new(10)),
            Err(SessionError::Expired)
        );
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn refresh_extends_expiry() {
        let registry = SessionRegistry::new(10);
        let session = registry.sign_in(alice(), Timestamp::new(0)).unwrap();
        let refreshed = registry.refresh(&session.token, Timestamp::new(8)).unwrap();
        assert_eq!(refreshed.expires_at, Timestamp::new(18));
        assert!(registry.resolve(&session.token, Timestamp::new(15)).is_ok());
    }

    #[test]
    fn purge_counts_only_expired() {
        let registry = SessionRegistry::new(10);
        registry.sign_in(alice(), Timestamp::new(0)).unwrap();
        registry
            .sign_in(AccountId::new("bob").unwrap(), Timestamp::new(50))
            .unwrap();
        assert_eq!(registry.purge_expired(Timestamp::new(20)), 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn events_are_broadcast() {
        let registry = SessionRegistry::new(10);
        let mut rx = registry.subscribe();
        let session = registry.sign_in(alice(), Timestamp::new(0)).unwrap();
        assert!(registry.sign_out(&session.token));
        assert!(!registry.sign_out(&session.token));

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedIn(session.clone()));
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::SignedOut {
                token: session.token,
                account: alice(),
            }
        );
    }
}
