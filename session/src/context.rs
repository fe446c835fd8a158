//! The injected session context.

use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use can_types::AccountId;

use crate::registry::{Session, SessionEvent, SessionRegistry};
use crate::SessionError;

/// Who is signed in, as seen by one request or connection.
///
/// Components receive a context instead of consulting global auth state.
/// The context follows exactly one token: registry events for that token
/// (refresh, sign-out) are applied to it, everything else is ignored.
/// Observers read the current value or watch it change.
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<Option<Session>>>,
}

impl SessionContext {
    pub fn new(initial: Option<Session>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<AccountId> {
        self.state.borrow().as_ref().map(|s| s.account.clone())
    }

    /// The signed-in account, or `Unauthenticated`.
    pub fn require_user(&self) -> Result<AccountId, SessionError> {
        self.current_user().ok_or(SessionError::Unauthenticated)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Fold one registry event into the context.
    pub fn apply(&self, event: &SessionEvent) {
        self.state.send_if_modified(|current| {
            let Some(session) = current.as_ref() else {
                return false;
            };
            if session.token != *event.token() {
                return false;
            }
            match event {
                SessionEvent::SignedOut { .. } => {
                    *current = None;
                    true
                }
                SessionEvent::TokenRefreshed(fresh) | SessionEvent::SignedIn(fresh) => {
                    if session == fresh {
                        return false;
                    }
                    *current = Some(fresh.clone());
                    true
                }
            }
        });
    }

    /// Subscribe to the registry once and keep this context current until the
    /// session ends or every handle to the context is dropped.
    ///
    /// The task holds the context weakly and wakes as soon as the last
    /// handle goes, even while the registry is quiet.
    pub fn follow(&self, registry: &SessionRegistry) -> JoinHandle<()> {
        let mut events = registry.subscribe();
        let state = Arc::downgrade(&self.state);
        let mut watched = self.state.subscribe();
        tokio::spawn(async move {
            loop {
                if watched.borrow_and_update().is_none() {
                    break;
                }
                tokio::select! {
                    changed = watched.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(event) => {
                            let Some(context) = Self::upgrade(&state) else {
                                break;
                            };
                            context.apply(&event);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "session context lagged behind registry");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("session follower stopped");
        })
    }

    fn upgrade(state: &Weak<watch::Sender<Option<Session>>>) -> Option<Self> {
        state.upgrade().map(|state| Self { state })
    }
}
