//! Change events emitted by the staking engine.

use can_types::{
    AccountId, EventRegistration, NetworkStats, NewsItem, Profile, Stake, TransactionRecord,
};

/// Row-level changes that observers can subscribe to via the [`EventBus`].
///
/// Each variant carries the full row as committed, so listeners never need
/// to read the store back.
#[derive(Clone, Debug)]
pub enum StakingEvent {
    /// A profile row was created or its balance, tier or name changed.
    ProfileChanged(Profile),
    /// A coin or NFT stake was opened.
    StakeInserted(Stake),
    /// A claim restarted a stake's accrual window.
    StakeUpdated(Stake),
    /// An entry was appended to the transaction log.
    TransactionInserted(TransactionRecord),
    /// A news item, announcement or event was published.
    NewsPublished(NewsItem),
    /// A user registered for an event.
    RegistrationInserted(EventRegistration),
    /// A user cancelled an event registration.
    RegistrationDeleted(EventRegistration),
    /// Ledger totals or counts moved.
    StatsChanged(NetworkStats),
}

impl StakingEvent {
    /// The account a row belongs to; `None` for network-wide rows.
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Self::ProfileChanged(p) => Some(&p.id),
            Self::StakeInserted(s) | Self::StakeUpdated(s) => Some(&s.owner),
            Self::TransactionInserted(t) => Some(&t.account),
            Self::RegistrationInserted(r) | Self::RegistrationDeleted(r) => Some(&r.account),
            Self::NewsPublished(_) | Self::StatsChanged(_) => None,
        }
    }
}

/// Synchronous fan-out event bus.
///
/// Listeners are invoked inline on the emitting thread after the store has
/// committed; keep handlers fast to avoid stalling requests.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&StakingEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&StakingEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &StakingEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
