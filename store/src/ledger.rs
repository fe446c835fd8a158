//! Atomic write operations over profiles, stakes, the transaction log, news
//! and event registrations.
//!
//! Each [`StakingLedger`] method is one transaction in the backend. The row
//! transitions themselves live here as plain functions so every backend
//! applies the same checks inside its own transaction.

use crate::{NewsStore, ProfileStore, StakeStore, StatsStore, StoreError, TransactionStore};
use can_types::{
    AccountId, Apy, CanAmount, EventRegistration, LedgerTotals, MembershipTier, NewsDraft,
    NewsId, NewsItem, Profile, Stake, StakeAsset, StakeId, StakeStatus, Timestamp, TransactionId,
    TransactionKind, TransactionRecord, TransactionStatus,
};

/// A stake about to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewStake {
    pub owner: AccountId,
    pub asset: StakeAsset,
    pub principal: CanAmount,
    pub apy: Apy,
    pub phase: Option<u8>,
    pub now: Timestamp,
}

impl NewStake {
    /// Coin stakes move the principal out of the balance; NFT stakes lock the
    /// NFT itself and leave the balance alone.
    pub fn debits_balance(&self) -> bool {
        matches!(self.asset, StakeAsset::Coin)
    }

    pub fn transaction_kind(&self) -> TransactionKind {
        match self.asset {
            StakeAsset::Coin => TransactionKind::Stake,
            StakeAsset::Nft { .. } => TransactionKind::NftStake,
        }
    }

    /// The row as stored, with the accrual window starting now.
    pub fn to_stake(&self, id: StakeId) -> Stake {
        Stake {
            id,
            owner: self.owner.clone(),
            asset: self.asset.clone(),
            principal: self.principal,
            apy: self.apy,
            staked_since: self.now,
            status: StakeStatus::Active,
            created_at: self.now,
        }
    }
}

/// A reward payout conditioned on the accrual window being unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimSettlement {
    pub stake_id: StakeId,
    pub owner: AccountId,
    /// The `staked_since` value the reward was computed from.
    pub expected_since: Timestamp,
    pub reward: CanAmount,
    pub phase: Option<u8>,
    pub now: Timestamp,
}

#[derive(Clone, Debug)]
pub struct StakeOpened {
    pub stake: Stake,
    pub profile: Profile,
    /// The profile row did not exist before this stake.
    pub profile_created: bool,
    pub transaction: TransactionRecord,
}

#[derive(Clone, Debug)]
pub struct ClaimSettled {
    pub stake: Stake,
    pub profile: Profile,
    pub transaction: TransactionRecord,
}

#[derive(Clone, Debug)]
pub struct BalanceChanged {
    pub profile: Profile,
    pub transaction: TransactionRecord,
}

/// The write side of the store. Every method commits atomically, together
/// with its effect on the [`LedgerTotals`].
pub trait StakingLedger:
    ProfileStore + StakeStore + TransactionStore + NewsStore + StatsStore
{
    /// Return the profile, creating an empty one if the account has none.
    fn ensure_profile(&self, id: &AccountId, now: Timestamp) -> Result<Profile, StoreError>;

    /// Change the display name. Fails with `NotFound` for unknown accounts.
    fn set_username(
        &self,
        id: &AccountId,
        username: Option<String>,
        now: Timestamp,
    ) -> Result<Profile, StoreError>;

    /// Add `amount` to the balance (creating the profile on first use) and
    /// log a deposit.
    fn credit(
        &self,
        id: &AccountId,
        amount: CanAmount,
        phase: Option<u8>,
        now: Timestamp,
    ) -> Result<BalanceChanged, StoreError>;

    /// Debit the principal (coin stakes), insert the stake and log it.
    ///
    /// Fails with `InsufficientFunds` if the balance does not cover the
    /// principal, and with `Duplicate` if the owner already has an active
    /// stake on the same NFT.
    fn open_stake(&self, new: &NewStake) -> Result<StakeOpened, StoreError>;

    /// Compare-and-swap the accrual window, credit the reward and log it.
    ///
    /// Fails with `NotFound` if the stake is missing or owned by someone
    /// else, and with `Conflict` if `staked_since` no longer equals
    /// `expected_since`.
    fn settle_claim(&self, settlement: &ClaimSettlement) -> Result<ClaimSettled, StoreError>;

    /// Debit the tier price, upgrade the membership and log the purchase.
    ///
    /// Fails with `Conflict` if the account already holds this tier or a
    /// higher one.
    fn purchase_tier(
        &self,
        id: &AccountId,
        tier: MembershipTier,
        phase: Option<u8>,
        now: Timestamp,
    ) -> Result<BalanceChanged, StoreError>;

    /// Assign the next news id and insert the item.
    fn publish_news(&self, draft: &NewsDraft, now: Timestamp) -> Result<NewsItem, StoreError>;

    /// Register `account` for an event.
    ///
    /// Fails with `NotFound` if `event` is missing or not an event, with
    /// `Duplicate` if the account is already registered, and with
    /// `CapacityReached` if the event is full.
    fn register_for_event(
        &self,
        event: NewsId,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<EventRegistration, StoreError>;

    /// Remove a registration and return it. Fails with `NotFound` if the
    /// account was not registered.
    fn cancel_registration(
        &self,
        event: NewsId,
        account: &AccountId,
    ) -> Result<EventRegistration, StoreError>;
}

// ── Row transitions shared by all backends ─────────────────────────────

/// Subtract `amount` from the balance or fail without touching it.
pub fn debit_profile(
    profile: &mut Profile,
    amount: CanAmount,
    now: Timestamp,
) -> Result<(), StoreError> {
    profile.balance = profile
        .balance
        .checked_sub(amount)
        .ok_or(StoreError::InsufficientFunds {
            needed: amount,
            available: profile.balance,
        })?;
    profile.updated_at = now;
    Ok(())
}

pub fn credit_profile(
    profile: &mut Profile,
    amount: CanAmount,
    now: Timestamp,
) -> Result<(), StoreError> {
    profile.balance = profile
        .balance
        .checked_add(amount)
        .ok_or_else(|| StoreError::Overflow(format!("balance of {} overflows", profile.id)))?;
    profile.updated_at = now;
    Ok(())
}

/// CAN entering circulation (deposits and rewards).
pub fn totals_credit(
    totals: &mut LedgerTotals,
    amount: CanAmount,
    now: Timestamp,
) -> Result<(), StoreError> {
    totals.circulating_supply = totals
        .circulating_supply
        .checked_add(amount)
        .ok_or_else(|| StoreError::Overflow("circulating supply overflows".to_string()))?;
    totals.updated_at = now;
    Ok(())
}

/// CAN leaving circulation (stake principal and tier purchases). The debit
/// was already checked against a balance, so the total cannot go negative.
pub fn totals_debit(totals: &mut LedgerTotals, amount: CanAmount, now: Timestamp) {
    totals.circulating_supply = totals.circulating_supply.saturating_sub(amount);
    totals.updated_at = now;
}

/// Principal entering an active stake.
pub fn totals_lock(
    totals: &mut LedgerTotals,
    amount: CanAmount,
    now: Timestamp,
) -> Result<(), StoreError> {
    totals.value_locked = totals
        .value_locked
        .checked_add(amount)
        .ok_or_else(|| StoreError::Overflow("total value locked overflows".to_string()))?;
    totals.updated_at = now;
    Ok(())
}

/// Apply a new stake to the totals: coin principal leaves circulation, and
/// every principal counts as locked.
pub fn totals_open_stake(totals: &mut LedgerTotals, new: &NewStake) -> Result<(), StoreError> {
    if new.debits_balance() {
        totals_debit(totals, new.principal, new.now);
    }
    totals_lock(totals, new.principal, new.now)
}

/// Check a registration request against the stored event.
pub fn check_registration(
    item: &NewsItem,
    account: &AccountId,
    already_registered: bool,
    registered: u64,
) -> Result<(), StoreError> {
    if !item.is_event() {
        return Err(StoreError::NotFound(format!("event {}", item.id)));
    }
    if already_registered {
        return Err(StoreError::Duplicate(format!(
            "{account} is already registered for event {}",
            item.id
        )));
    }
    if item.is_full(registered) {
        return Err(StoreError::CapacityReached(format!(
            "event {} is full",
            item.id
        )));
    }
    Ok(())
}

/// Reject a second active stake by the same owner on the same NFT.
pub fn check_nft_unique<'a>(
    new: &NewStake,
    existing: impl IntoIterator<Item = &'a Stake>,
) -> Result<(), StoreError> {
    let StakeAsset::Nft { nft_id, .. } = &new.asset else {
        return Ok(());
    };
    let taken = existing.into_iter().any(|s| {
        s.is_active()
            && s.owner == new.owner
            && matches!(&s.asset, StakeAsset::Nft { nft_id: other, .. } if other == nft_id)
    });
    if taken {
        return Err(StoreError::Duplicate(format!(
            "{} already staked by {}",
            nft_id, new.owner
        )));
    }
    Ok(())
}

/// Validate the claim against the stored stake and restart its window.
pub fn apply_claim(stake: &mut Stake, settlement: &ClaimSettlement) -> Result<(), StoreError> {
    if stake.owner != settlement.owner {
        return Err(StoreError::NotFound(format!("stake {}", settlement.stake_id)));
    }
    if !stake.is_active() {
        return Err(StoreError::Conflict(format!(
            "stake {} is closed",
            settlement.stake_id
        )));
    }
    if stake.staked_since != settlement.expected_since {
        return Err(StoreError::Conflict(format!(
            "stake {} window moved from {} to {}",
            settlement.stake_id, settlement.expected_since, stake.staked_since
        )));
    }
    stake.staked_since = settlement.now;
    Ok(())
}

/// Upgrade the membership tier, paying its price from the balance.
pub fn apply_tier_purchase(
    profile: &mut Profile,
    tier: MembershipTier,
    now: Timestamp,
) -> Result<(), StoreError> {
    if profile.membership_tier.is_some_and(|current| current >= tier) {
        return Err(StoreError::Conflict(format!(
            "{} already holds {} or higher",
            profile.id, tier
        )));
    }
    debit_profile(profile, tier.price(), now)?;
    profile.total_invested = profile.total_invested.saturating_add(tier.price());
    profile.membership_tier = Some(tier);
    Ok(())
}

pub fn make_transaction(
    id: TransactionId,
    account: &AccountId,
    kind: TransactionKind,
    amount: CanAmount,
    phase: Option<u8>,
    now: Timestamp,
) -> TransactionRecord {
    TransactionRecord {
        id,
        account: account.clone(),
        kind,
        amount,
        phase,
        status: TransactionStatus::Completed,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn funded(balance: u128) -> Profile {
        let mut p = Profile::new(account("alice"), Timestamp::new(0));
        p.balance = CanAmount::from_can(balance);
        p
    }

    #[test]
    fn debit_leaves_profile_untouched_on_shortfall() {
        let mut p = funded(100);
        let err = debit_profile(&mut p, CanAmount::from_can(500), Timestamp::new(5)).unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));
        assert_eq!(p.balance, CanAmount::from_can(100));
        assert_eq!(p.updated_at, Timestamp::new(0));
    }

    #[test]
    fn claim_requires_matching_window_and_owner() {
        let new = NewStake {
            owner: account("alice"),
            asset: StakeAsset::Coin,
            principal: CanAmount::from_can(1_000),
            apy: Apy::COIN_DEFAULT,
            phase: None,
            now: Timestamp::new(100),
        };
        let mut stake = new.to_stake(StakeId::new(1));
        let mut settlement = ClaimSettlement {
            stake_id: StakeId::new(1),
            owner: account("bob"),
            expected_since: Timestamp::new(100),
            reward: CanAmount::from_can(1),
            phase: None,
            now: Timestamp::new(200),
        };
        assert!(matches!(
            apply_claim(&mut stake, &settlement),
            Err(StoreError::NotFound(_))
        ));

        settlement.owner = account("alice");
        settlement.expected_since = Timestamp::new(99);
        assert!(matches!(
            apply_claim(&mut stake, &settlement),
            Err(StoreError::Conflict(_))
        ));

        settlement.expected_since = Timestamp::new(100);
        apply_claim(&mut stake, &settlement).unwrap();
        assert_eq!(stake.staked_since, Timestamp::new(200));
    }

    #[test]
    fn tier_purchase_must_upgrade() {
        let mut p = funded(1_000);
        apply_tier_purchase(&mut p, MembershipTier::Silver, Timestamp::new(1)).unwrap();
        assert_eq!(p.balance, CanAmount::from_can(750));
        assert_eq!(p.total_invested, CanAmount::from_can(250));

        let err = apply_tier_purchase(&mut p, MembershipTier::Bronze, Timestamp::new(2));
        assert!(matches!(err, Err(StoreError::Conflict(_))));
        assert_eq!(p.membership_tier, Some(MembershipTier::Silver));
    }

    #[test]
    fn credit_overflow_is_reported_as_overflow() {
        let mut p = funded(0);
        p.balance = CanAmount::MAX;
        let err = credit_profile(&mut p, CanAmount::new(1), Timestamp::new(1)).unwrap_err();
        assert!(matches!(err, StoreError::Overflow(_)));
        assert_eq!(p.balance, CanAmount::MAX);
    }

    #[test]
    fn totals_track_circulation_and_locked_value() {
        let mut totals = LedgerTotals::default();
        totals_credit(&mut totals, CanAmount::from_can(1_000), Timestamp::new(1)).unwrap();

        let coin = NewStake {
            owner: account("alice"),
            asset: StakeAsset::Coin,
            principal: CanAmount::from_can(400),
            apy: Apy::COIN_DEFAULT,
            phase: None,
            now: Timestamp::new(2),
        };
        totals_open_stake(&mut totals, &coin).unwrap();
        assert_eq!(totals.circulating_supply, CanAmount::from_can(600));
        assert_eq!(totals.value_locked, CanAmount::from_can(400));

        let nft = NewStake {
            asset: StakeAsset::Nft {
                nft_id: "nft-1".into(),
                nft_name: "Premium Business NFT".into(),
            },
            principal: CanAmount::from_can(50_000),
            now: Timestamp::new(3),
            ..coin
        };
        totals_open_stake(&mut totals, &nft).unwrap();
        assert_eq!(totals.circulating_supply, CanAmount::from_can(600));
        assert_eq!(totals.value_locked, CanAmount::from_can(50_400));
        assert_eq!(totals.updated_at, Timestamp::new(3));

        totals.circulating_supply = CanAmount::MAX;
        assert!(matches!(
            totals_credit(&mut totals, CanAmount::new(1), Timestamp::new(4)),
            Err(StoreError::Overflow(_))
        ));
    }

    #[test]
    fn registration_checks() {
        let draft = NewsDraft {
            kind: can_types::NewsKind::Event,
            title: "Meetup".into(),
            description: "Investor meetup".into(),
            content: None,
            image_url: None,
            location: None,
            starts_at: None,
            ends_at: None,
            max_attendees: Some(1),
            featured: false,
        };
        let mut item = draft.into_item(NewsId::new(3), Timestamp::new(0));
        let alice = account("alice");

        check_registration(&item, &alice, false, 0).unwrap();
        assert!(matches!(
            check_registration(&item, &alice, true, 0),
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            check_registration(&item, &alice, false, 1),
            Err(StoreError::CapacityReached(_))
        ));

        item.kind = can_types::NewsKind::News;
        assert!(matches!(
            check_registration(&item, &alice, false, 0),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn nft_uniqueness_is_per_owner_and_active_only() {
        let nft = StakeAsset::Nft {
            nft_id: "nft-1".into(),
            nft_name: "Premium Business NFT".into(),
        };
        let new = NewStake {
            owner: account("alice"),
            asset: nft.clone(),
            principal: CanAmount::from_can(50_000),
            apy: Apy::NFT_DEFAULT,
            phase: None,
            now: Timestamp::new(0),
        };
        let mut existing = new.to_stake(StakeId::new(7));
        assert!(check_nft_unique(&new, [&existing]).is_err());

        existing.status = StakeStatus::Closed;
        assert!(check_nft_unique(&new, [&existing]).is_ok());

        existing.status = StakeStatus::Active;
        existing.owner = account("bob");
        assert!(check_nft_unique(&new, [&existing]).is_ok());
    }
}
