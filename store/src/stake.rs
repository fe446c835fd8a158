//! Stake storage trait.

use crate::StoreError;
use can_types::{AccountId, Stake, StakeId, StakeKind};

/// Read access to the `staking_coin` and `staking_nft` tables.
pub trait StakeStore {
    fn get_stake(&self, id: StakeId) -> Result<Stake, StoreError>;

    /// All stakes of one owner, newest first, optionally restricted to one table.
    fn stakes_for_owner(
        &self,
        owner: &AccountId,
        kind: Option<StakeKind>,
    ) -> Result<Vec<Stake>, StoreError>;

    fn stake_count(&self) -> Result<u64, StoreError>;
}
