//! Network-wide statistics (the `network_stats` row).

use serde::{Deserialize, Serialize};

use crate::{CanAmount, Timestamp};

/// Running totals kept by the store, updated inside every balance-moving
/// write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Sum of all spendable balances.
    pub circulating_supply: CanAmount,
    /// Principal held in active stakes, coin and NFT.
    pub value_locked: CanAmount,
    /// Time of the last write that moved a total.
    pub updated_at: Timestamp,
}

/// The public statistics row shown on the landing page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub total_supply: CanAmount,
    pub circulating_supply: CanAmount,
    pub total_value_locked: CanAmount,
    /// Accounts with a profile.
    pub total_holders: u64,
    pub total_transactions: u64,
    pub current_phase: Option<u8>,
    pub updated_at: Timestamp,
}

impl NetworkStats {
    /// Circulating share of the total supply, in basis points.
    pub fn circulation_bps(&self) -> u32 {
        if self.total_supply.is_zero() {
            return 0;
        }
        let share = self
            .circulating_supply
            .raw()
            .saturating_mul(10_000)
            / self.total_supply.raw();
        u32::try_from(share).unwrap_or(u32::MAX)
    }
}
