//! LMDB implementation of StatsStore.

use can_store::{StatsStore, StoreError};
use can_types::LedgerTotals;

use crate::{LmdbEnvironment, LmdbError};

impl StatsStore for LmdbEnvironment {
    fn ledger_totals(&self) -> Result<LedgerTotals, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.totals_in(&rtxn)?)
    }
}
