//! Ledger totals storage trait.

use crate::StoreError;
use can_types::LedgerTotals;

/// Read access to the running totals behind the network statistics.
pub trait StatsStore {
    /// Totals as of the last committed write; all zero on a fresh store.
    fn ledger_totals(&self) -> Result<LedgerTotals, StoreError>;
}
