//! Transaction log storage trait.

use crate::StoreError;
use can_types::{AccountId, TransactionId, TransactionKind, TransactionRecord};

/// Filter for [`TransactionStore::recent_transactions`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub account: Option<AccountId>,
    pub phase: Option<u8>,
    pub kind: Option<TransactionKind>,
    /// Maximum number of rows returned. Zero means no rows.
    pub limit: usize,
}

impl TransactionQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.account.as_ref().map_or(true, |a| *a == record.account)
            && self.phase.map_or(true, |p| record.phase == Some(p))
            && self.kind.map_or(true, |k| record.kind == k)
    }
}

/// Read access to the append-only `transactions` table.
pub trait TransactionStore {
    fn get_transaction(&self, id: TransactionId) -> Result<TransactionRecord, StoreError>;

    /// Matching entries, newest first, at most `query.limit`.
    fn recent_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn transaction_count(&self) -> Result<u64, StoreError>;
}
