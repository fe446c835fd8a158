//! LMDB implementation of StakeStore.
//!
//! Stakes are keyed by big-endian id, so the `owner_stakes` index iterated
//! in reverse yields an owner's stakes newest first.

use can_store::{StakeStore, StoreError};
use can_types::{AccountId, Stake, StakeId, StakeKind};

use crate::environment::{owner_prefix, read_record, stake_id_from_index_key};
use crate::{LmdbEnvironment, LmdbError};

impl StakeStore for LmdbEnvironment {
    fn get_stake(&self, id: StakeId) -> Result<Stake, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        read_record::<Stake>(&self.stakes_db, &rtxn, &id.to_be_bytes())?
            .ok_or_else(|| StoreError::NotFound(format!("stake {id}")))
    }

    fn stakes_for_owner(
        &self,
        owner: &AccountId,
        kind: Option<StakeKind>,
    ) -> Result<Vec<Stake>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let prefix = owner_prefix(owner);
        let iter = self
            .owner_stakes_db
            .rev_prefix_iter(&rtxn, prefix.as_slice())
            .map_err(LmdbError::from)?;

        let mut stakes = Vec::new();
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let id = stake_id_from_index_key(key)?;
            let stake = read_record::<Stake>(&self.stakes_db, &rtxn, &id.to_be_bytes())?
                .ok_or_else(|| {
                    LmdbError::Corruption(format!("owner index points at missing stake {id}"))
                })?;
            if kind.map_or(true, |k| stake.kind() == k) {
                stakes.push(stake);
            }
        }
        Ok(stakes)
    }

    fn stake_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.stakes_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
