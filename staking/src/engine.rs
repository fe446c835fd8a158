//! Core staking engine.

use std::sync::Arc;

use serde::Serialize;

use can_store::{
    ClaimSettlement, NewStake, NewsQuery, StakingLedger, StoreError, TransactionQuery,
};
use can_types::{
    AccountId, Apy, CanAmount, EventRegistration, MembershipTier, NetworkStats, NewsDraft, NewsId,
    NewsItem, Profile, Stake, StakeAsset, StakeId, StakeKind, StakingParams, Timestamp,
    TransactionRecord,
};

use crate::accrual::compute_reward;
use crate::error::StakingError;
use crate::events::{EventBus, StakingEvent};
use crate::portfolio::{Portfolio, StakeView};

/// Longest accepted display name, in characters.
pub const MAX_USERNAME_LEN: usize = 32;

/// Longest accepted news title, in characters.
pub const MAX_NEWS_TITLE_LEN: usize = 200;

/// Outcome of a successful claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub stake_id: StakeId,
    pub credited: CanAmount,
    pub new_staked_since: Timestamp,
    /// Owner's balance right after the credit.
    pub balance: CanAmount,
}

/// A user's view of one event's registrations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub event_id: NewsId,
    pub registered: bool,
    pub registrations: u64,
    pub max_attendees: Option<u32>,
}

/// The staking engine: validates requests, computes rewards and drives the
/// atomic ledger operations of the store.
///
/// The engine itself holds no mutable state. Every write is one
/// [`StakingLedger`] call, so an engine can be shared across threads behind an
/// `Arc` and used from any number of requests at once.
pub struct StakingEngine<S> {
    store: Arc<S>,
    params: StakingParams,
    events: EventBus,
}

impl<S: StakingLedger> StakingEngine<S> {
    pub fn new(store: Arc<S>, params: StakingParams) -> Self {
        Self::with_events(store, params, EventBus::new())
    }

    pub fn with_events(store: Arc<S>, params: StakingParams, events: EventBus) -> Self {
        Self {
            store,
            params,
            events,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn params(&self) -> &StakingParams {
        &self.params
    }

    /// Reward accrued on `stake` as of `now`. Closed stakes accrue nothing.
    pub fn pending_reward(&self, stake: &Stake, now: Timestamp) -> CanAmount {
        if !stake.is_active() {
            return CanAmount::ZERO;
        }
        compute_reward(stake.principal, stake.apy, stake.staked_since, now)
    }

    // ── Stake creation ─────────────────────────────────────────────────

    /// Lock `principal` CAN from the owner's balance in a new coin stake at
    /// the given rate.
    pub fn create_stake(
        &self,
        owner: &AccountId,
        principal: CanAmount,
        apy: Apy,
        now: Timestamp,
    ) -> Result<StakeId, StakingError> {
        self.insert_coin_stake(owner, principal, apy, now)
            .map(|stake| stake.id)
    }

    /// Coin stake at the configured policy rate.
    pub fn create_coin_stake(
        &self,
        owner: &AccountId,
        principal: CanAmount,
        now: Timestamp,
    ) -> Result<StakeId, StakingError> {
        self.create_stake(owner, principal, self.params.coin_apy, now)
    }

    /// Open a coin stake at the policy rate and return the committed row.
    /// The view is built from what the write returned, never read back.
    pub fn open_coin_stake(
        &self,
        owner: &AccountId,
        principal: CanAmount,
        now: Timestamp,
    ) -> Result<StakeView, StakingError> {
        let stake = self.insert_coin_stake(owner, principal, self.params.coin_apy, now)?;
        Ok(self.view(stake, now))
    }

    fn insert_coin_stake(
        &self,
        owner: &AccountId,
        principal: CanAmount,
        apy: Apy,
        now: Timestamp,
    ) -> Result<Stake, StakingError> {
        if principal.is_zero() {
            return Err(StakingError::InvalidAmount(
                "stake principal must be positive".to_string(),
            ));
        }
        let available = self.store.balance(owner)?;
        if principal > available {
            return Err(StakingError::InsufficientBalance {
                needed: principal,
                available,
            });
        }

        let new = NewStake {
            owner: owner.clone(),
            asset: StakeAsset::Coin,
            principal,
            apy,
            phase: self.params.current_phase,
            now,
        };
        let opened = self.store.open_stake(&new)?;

        tracing::info!(
            stake = %opened.stake.id,
            owner = %owner,
            principal = %principal,
            apy = %apy,
            "coin stake opened"
        );
        self.events
            .emit(&StakingEvent::ProfileChanged(opened.profile));
        self.events
            .emit(&StakingEvent::StakeInserted(opened.stake.clone()));
        self.events
            .emit(&StakingEvent::TransactionInserted(opened.transaction));
        self.publish_stats(now);
        Ok(opened.stake)
    }

    /// Stake a catalog NFT. The principal is the NFT's appraised value; the
    /// balance is not touched.
    pub fn create_nft_stake(
        &self,
        owner: &AccountId,
        nft_id: &str,
        now: Timestamp,
    ) -> Result<StakeId, StakingError> {
        self.insert_nft_stake(owner, nft_id, now)
            .map(|stake| stake.id)
    }

    /// Stake a catalog NFT and return the committed row.
    pub fn open_nft_stake(
        &self,
        owner: &AccountId,
        nft_id: &str,
        now: Timestamp,
    ) -> Result<StakeView, StakingError> {
        let stake = self.insert_nft_stake(owner, nft_id, now)?;
        Ok(self.view(stake, now))
    }

    fn insert_nft_stake(
        &self,
        owner: &AccountId,
        nft_id: &str,
        now: Timestamp,
    ) -> Result<Stake, StakingError> {
        let listing = self
            .params
            .nft(nft_id)
            .ok_or_else(|| StakingError::UnknownNft(nft_id.to_string()))?;
        if listing.value.is_zero() {
            return Err(StakingError::InvalidAmount(format!(
                "NFT {nft_id} has no appraised value"
            )));
        }

        let new = NewStake {
            owner: owner.clone(),
            asset: StakeAsset::Nft {
                nft_id: listing.id.clone(),
                nft_name: listing.name.clone(),
            },
            principal: listing.value,
            apy: self.params.nft_apy,
            phase: self.params.current_phase,
            now,
        };
        let opened = self.store.open_stake(&new).map_err(|e| match e {
            StoreError::Duplicate(_) => StakingError::AlreadyStaked(nft_id.to_string()),
            other => other.into(),
        })?;

        tracing::info!(stake = %opened.stake.id, owner = %owner, nft = nft_id, "NFT stake opened");
        if opened.profile_created {
            self.events
                .emit(&StakingEvent::ProfileChanged(opened.profile));
        }
        self.events
            .emit(&StakingEvent::StakeInserted(opened.stake.clone()));
        self.events
            .emit(&StakingEvent::TransactionInserted(opened.transaction));
        self.publish_stats(now);
        Ok(opened.stake)
    }

    // ── Claims ─────────────────────────────────────────────────────────

    /// Pay out the reward accrued on one stake and restart its window at
    /// `now`.
    ///
    /// The store applies the payout only if `staked_since` still holds the
    /// value the reward was computed from. When another claim got there
    /// first, the stake is read again; its fresh window then carries no
    /// reward and the call fails with `NothingToClaim`, so racing claims pay
    /// out once.
    pub fn claim(
        &self,
        stake_id: StakeId,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<ClaimReceipt, StakingError> {
        let attempts = self.params.max_claim_attempts.max(1);
        for attempt in 1..=attempts {
            let stake = self.owned_stake(stake_id, owner)?;
            let reward = self.pending_reward(&stake, now);
            if reward < self.params.dust_threshold || reward.is_zero() {
                tracing::debug!(stake = %stake_id, pending = %reward, "claim below threshold");
                return Err(StakingError::NothingToClaim { pending: reward });
            }

            let settlement = ClaimSettlement {
                stake_id,
                owner: owner.clone(),
                expected_since: stake.staked_since,
                reward,
                phase: self.params.current_phase,
                now,
            };
            match self.store.settle_claim(&settlement) {
                Ok(settled) => {
                    tracing::info!(
                        stake = %stake_id,
                        owner = %owner,
                        credited = %reward,
                        "reward claimed"
                    );
                    let receipt = ClaimReceipt {
                        stake_id,
                        credited: reward,
                        new_staked_since: settled.stake.staked_since,
                        balance: settled.profile.balance,
                    };
                    self.events
                        .emit(&StakingEvent::ProfileChanged(settled.profile));
                    self.events.emit(&StakingEvent::StakeUpdated(settled.stake));
                    self.events
                        .emit(&StakingEvent::TransactionInserted(settled.transaction));
                    self.publish_stats(now);
                    return Ok(receipt);
                }
                Err(StoreError::Conflict(reason)) => {
                    tracing::debug!(stake = %stake_id, attempt, %reason, "claim lost a race, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(stake = %stake_id, attempts, "claim gave up after repeated conflicts");
        Err(StakingError::TransientStoreFailure(format!(
            "stake {stake_id} kept changing during claim"
        )))
    }

    fn owned_stake(&self, stake_id: StakeId, owner: &AccountId) -> Result<Stake, StakingError> {
        let stake = self.store.get_stake(stake_id)?;
        if stake.owner != *owner {
            return Err(StakingError::NotFound(format!("stake {stake_id}")));
        }
        Ok(stake)
    }

    // ── Reads ──────────────────────────────────────────────────────────

    pub fn balance(&self, owner: &AccountId) -> Result<CanAmount, StakingError> {
        Ok(self.store.balance(owner)?)
    }

    pub fn profile(&self, owner: &AccountId) -> Result<Profile, StakingError> {
        Ok(self.store.get_profile(owner)?)
    }

    /// One stake with its pending reward. Stakes of other owners read as
    /// missing.
    pub fn stake(
        &self,
        stake_id: StakeId,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<StakeView, StakingError> {
        let stake = self.owned_stake(stake_id, owner)?;
        Ok(self.view(stake, now))
    }

    /// The owner's stakes, newest first, with pending rewards as of `now`.
    pub fn stakes(
        &self,
        owner: &AccountId,
        kind: Option<StakeKind>,
        now: Timestamp,
    ) -> Result<Vec<StakeView>, StakingError> {
        Ok(self
            .store
            .stakes_for_owner(owner, kind)?
            .into_iter()
            .map(|stake| self.view(stake, now))
            .collect())
    }

    pub fn portfolio(&self, owner: &AccountId, now: Timestamp) -> Result<Portfolio, StakingError> {
        let (balance, tier) = match self.store.get_profile(owner) {
            Ok(profile) => (profile.balance, profile.membership_tier),
            Err(StoreError::NotFound(_)) => (CanAmount::ZERO, None),
            Err(e) => return Err(e.into()),
        };
        let stakes = self.store.stakes_for_owner(owner, None)?;
        Ok(Portfolio::build(
            owner.clone(),
            balance,
            tier,
            stakes,
            &self.params,
            now,
        ))
    }

    pub fn recent_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, StakingError> {
        Ok(self.store.recent_transactions(query)?)
    }

    fn view(&self, stake: Stake, now: Timestamp) -> StakeView {
        StakeView::at(stake, self.params.dust_threshold, now)
    }

    // ── Profiles, membership, deposits ─────────────────────────────────

    /// Return the owner's profile, creating an empty one on first sight.
    pub fn ensure_profile(&self, owner: &AccountId, now: Timestamp) -> Result<Profile, StakingError> {
        let existed = self.store.profile_exists(owner)?;
        let profile = self.store.ensure_profile(owner, now)?;
        if !existed {
            tracing::info!(account = %owner, "profile created");
            self.events
                .emit(&StakingEvent::ProfileChanged(profile.clone()));
            self.publish_stats(now);
        }
        Ok(profile)
    }

    pub fn set_username(
        &self,
        owner: &AccountId,
        username: &str,
        now: Timestamp,
    ) -> Result<Profile, StakingError> {
        let username = validate_username(username)?;
        let profile = self.store.set_username(owner, Some(username), now)?;
        self.events
            .emit(&StakingEvent::ProfileChanged(profile.clone()));
        Ok(profile)
    }

    /// Buy a membership tier with CAN from the balance.
    pub fn purchase_tier(
        &self,
        owner: &AccountId,
        tier: MembershipTier,
        now: Timestamp,
    ) -> Result<Profile, StakingError> {
        let changed = self
            .store
            .purchase_tier(owner, tier, self.params.current_phase, now)
            .map_err(|e| match e {
                StoreError::Conflict(_) => StakingError::TierNotUpgrade {
                    requested: tier.to_string(),
                },
                other => other.into(),
            })?;

        tracing::info!(account = %owner, tier = %tier, price = %tier.price(), "membership purchased");
        self.events
            .emit(&StakingEvent::ProfileChanged(changed.profile.clone()));
        self.events
            .emit(&StakingEvent::TransactionInserted(changed.transaction));
        self.publish_stats(now);
        Ok(changed.profile)
    }

    /// Credit the owner's balance, creating the profile on first use.
    pub fn deposit(
        &self,
        owner: &AccountId,
        amount: CanAmount,
        now: Timestamp,
    ) -> Result<Profile, StakingError> {
        if amount.is_zero() {
            return Err(StakingError::InvalidAmount(
                "deposit must be positive".to_string(),
            ));
        }
        let changed = self
            .store
            .credit(owner, amount, self.params.current_phase, now)?;

        tracing::info!(account = %owner, amount = %amount, "deposit credited");
        self.events
            .emit(&StakingEvent::ProfileChanged(changed.profile.clone()));
        self.events
            .emit(&StakingEvent::TransactionInserted(changed.transaction));
        self.publish_stats(now);
        Ok(changed.profile)
    }

    // ── Network statistics ─────────────────────────────────────────────

    /// The public statistics row: running ledger totals plus the holder and
    /// transaction counts, stamped with the policy's supply and phase.
    pub fn network_stats(&self) -> Result<NetworkStats, StakingError> {
        let totals = self.store.ledger_totals()?;
        Ok(NetworkStats {
            total_supply: self.params.total_supply,
            circulating_supply: totals.circulating_supply,
            total_value_locked: totals.value_locked,
            total_holders: self.store.profile_count()?,
            total_transactions: self.store.transaction_count()?,
            current_phase: self.params.current_phase,
            updated_at: totals.updated_at,
        })
    }

    /// Push the statistics row to listeners after a committed write. The
    /// write already succeeded, so a failed read here is only logged.
    fn publish_stats(&self, now: Timestamp) {
        if self.events.listener_count() == 0 {
            return;
        }
        match self.network_stats() {
            Ok(mut stats) => {
                stats.updated_at = stats.updated_at.max(now);
                self.events.emit(&StakingEvent::StatsChanged(stats));
            }
            Err(e) => tracing::warn!(error = %e, "network stats not published"),
        }
    }

    // ── News and events ────────────────────────────────────────────────

    pub fn publish_news(&self, draft: NewsDraft, now: Timestamp) -> Result<NewsItem, StakingError> {
        let draft = validate_news(draft)?;
        let item = self.store.publish_news(&draft, now)?;
        tracing::info!(news = %item.id, kind = %item.kind, title = %item.title, "news published");
        self.events.emit(&StakingEvent::NewsPublished(item.clone()));
        Ok(item)
    }

    pub fn news(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, StakingError> {
        Ok(self.store.recent_news(query)?)
    }

    pub fn news_item(&self, id: NewsId) -> Result<NewsItem, StakingError> {
        Ok(self.store.get_news(id)?)
    }

    pub fn registration_count(&self, event: NewsId) -> Result<u64, StakingError> {
        Ok(self.store.registration_count(event)?)
    }

    /// Whether `account` is registered for an event, with the current count.
    pub fn registration_status(
        &self,
        event: NewsId,
        account: &AccountId,
    ) -> Result<RegistrationStatus, StakingError> {
        let item = self.event(event)?;
        Ok(RegistrationStatus {
            event_id: event,
            registered: self.store.is_registered(event, account)?,
            registrations: self.store.registration_count(event)?,
            max_attendees: item.max_attendees,
        })
    }

    /// Register for an event that has not ended and still has room. One
    /// registration per account and event.
    pub fn register_for_event(
        &self,
        event: NewsId,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<EventRegistration, StakingError> {
        let item = self.event(event)?;
        if item.event_status(now) == Some(can_types::EventStatus::Ended) {
            return Err(StakingError::RegistrationClosed(event.to_string()));
        }
        let registration = self
            .store
            .register_for_event(event, account, now)
            .map_err(|e| match e {
                StoreError::Duplicate(_) => StakingError::AlreadyRegistered(event.to_string()),
                other => other.into(),
            })?;

        tracing::info!(event = %event, account = %account, "event registration added");
        self.events
            .emit(&StakingEvent::RegistrationInserted(registration.clone()));
        Ok(registration)
    }

    pub fn cancel_registration(
        &self,
        event: NewsId,
        account: &AccountId,
    ) -> Result<EventRegistration, StakingError> {
        let registration = self.store.cancel_registration(event, account)?;
        tracing::info!(event = %event, account = %account, "event registration cancelled");
        self.events
            .emit(&StakingEvent::RegistrationDeleted(registration.clone()));
        Ok(registration)
    }

    fn event(&self, id: NewsId) -> Result<NewsItem, StakingError> {
        let item = self.store.get_news(id).map_err(|e| match e {
            StoreError::NotFound(_) => StakingError::NotFound(format!("event {id}")),
            other => other.into(),
        })?;
        if !item.is_event() {
            return Err(StakingError::NotFound(format!("event {id}")));
        }
        Ok(item)
    }
}

/// Trim and check a news draft before it is stored.
pub fn validate_news(mut draft: NewsDraft) -> Result<NewsDraft, StakingError> {
    draft.title = draft.title.trim().to_string();
    draft.description = draft.description.trim().to_string();
    if draft.title.is_empty() {
        return Err(StakingError::InvalidNews("title must not be empty".to_string()));
    }
    if draft.title.chars().count() > MAX_NEWS_TITLE_LEN {
        return Err(StakingError::InvalidNews(format!(
            "title is longer than {MAX_NEWS_TITLE_LEN} characters"
        )));
    }
    if draft.description.is_empty() {
        return Err(StakingError::InvalidNews(
            "description must not be empty".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (draft.starts_at, draft.ends_at) {
        if end < start {
            return Err(StakingError::InvalidNews(
                "event ends before it starts".to_string(),
            ));
        }
    }
    if draft.max_attendees == Some(0) {
        return Err(StakingError::InvalidNews(
            "max_attendees must be positive".to_string(),
        ));
    }
    Ok(draft)
}

/// Trim and check a display name: 1 to [`MAX_USERNAME_LEN`] characters, no
/// control characters.
pub fn validate_username(raw: &str) -> Result<String, StakingError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(StakingError::InvalidUsername("must not be empty".to_string()));
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(StakingError::InvalidUsername(format!(
            "at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(StakingError::InvalidUsername(
            "control characters are not allowed".to_string(),
        ));
    }
    Ok(name.to_string())
}
