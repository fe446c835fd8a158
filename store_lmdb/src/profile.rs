//! LMDB implementation of ProfileStore.

use can_store::{ProfileStore, StoreError};
use can_types::{AccountId, Profile};

use crate::environment::read_record;
use crate::{LmdbEnvironment, LmdbError};

impl ProfileStore for LmdbEnvironment {
    fn get_profile(&self, id: &AccountId) -> Result<Profile, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        read_record::<Profile>(&self.profiles_db, &rtxn, id.as_str().as_bytes())?
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    fn profile_exists(&self, id: &AccountId) -> Result<bool, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let found = self
            .profiles_db
            .get(&rtxn, id.as_str().as_bytes())
            .map_err(LmdbError::from)?
            .is_some();
        Ok(found)
    }

    fn profile_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.profiles_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
