//! Read-side summary of one owner's holdings.

use serde::Serialize;

use can_types::{AccountId, CanAmount, MembershipTier, Stake, StakeKind, StakingParams, Timestamp};

use crate::accrual::compute_reward;

/// A stake together with the reward it has accrued as of the portfolio time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StakeView {
    #[serde(flatten)]
    pub stake: Stake,
    pub pending_reward: CanAmount,
    /// Whether the pending reward clears the dust threshold.
    pub claimable: bool,
}

impl StakeView {
    /// Compute the pending reward of `stake` as of `now`. Closed stakes
    /// accrue nothing.
    pub fn at(stake: Stake, dust_threshold: CanAmount, now: Timestamp) -> Self {
        let pending_reward = if stake.is_active() {
            compute_reward(stake.principal, stake.apy, stake.staked_since, now)
        } else {
            CanAmount::ZERO
        };
        Self {
            claimable: !pending_reward.is_zero() && pending_reward >= dust_threshold,
            stake,
            pending_reward,
        }
    }
}

/// Totals for one stake table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub count: usize,
    pub total_principal: CanAmount,
    pub total_pending: CanAmount,
}

impl KindSummary {
    fn add(&mut self, view: &StakeView) {
        self.count += 1;
        self.total_principal = self.total_principal.saturating_add(view.stake.principal);
        self.total_pending = self.total_pending.saturating_add(view.pending_reward);
    }
}

/// Balance, per-table totals and every stake with its pending reward.
///
/// Everything here is derived at `as_of`; nothing is cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Portfolio {
    pub owner: AccountId,
    pub balance: CanAmount,
    pub membership_tier: Option<MembershipTier>,
    pub coin: KindSummary,
    pub nft: KindSummary,
    /// Newest first.
    pub stakes: Vec<StakeView>,
    pub as_of: Timestamp,
}

impl Portfolio {
    /// Assemble a portfolio from rows already read from the store.
    ///
    /// `stakes` must be newest first; the order is kept.
    pub fn build(
        owner: AccountId,
        balance: CanAmount,
        membership_tier: Option<MembershipTier>,
        stakes: Vec<Stake>,
        params: &StakingParams,
        now: Timestamp,
    ) -> Self {
        let mut coin = KindSummary::default();
        let mut nft = KindSummary::default();
        let stakes: Vec<StakeView> = stakes
            .into_iter()
            .map(|stake| StakeView::at(stake, params.dust_threshold, now))
            .collect();

        for view in &stakes {
            match view.stake.kind() {
                StakeKind::Coin => coin.add(view),
                StakeKind::Nft => nft.add(view),
            }
        }

        Self {
            owner,
            balance,
            membership_tier,
            coin,
            nft,
            stakes,
            as_of: now,
        }
    }

    /// Pending reward across both tables.
    pub fn total_pending(&self) -> CanAmount {
        self.coin.total_pending.saturating_add(self.nft.total_pending)
    }
}
