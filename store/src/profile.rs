//! Profile (balance) storage trait.

use crate::StoreError;
use can_types::{AccountId, CanAmount, Profile};

/// Read access to the `profiles` table.
///
/// There is no `put_profile`: balances only change through the atomic
/// deltas of [`crate::StakingLedger`].
pub trait ProfileStore {
    fn get_profile(&self, id: &AccountId) -> Result<Profile, StoreError>;

    fn profile_exists(&self, id: &AccountId) -> Result<bool, StoreError>;

    fn profile_count(&self) -> Result<u64, StoreError>;

    /// Spendable balance; an account without a profile holds nothing.
    fn balance(&self, id: &AccountId) -> Result<CanAmount, StoreError> {
        match self.get_profile(id) {
            Ok(profile) => Ok(profile.balance),
            Err(StoreError::NotFound(_)) => Ok(CanAmount::ZERO),
            Err(e) => Err(e),
        }
    }
}
