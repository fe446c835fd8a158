//! LMDB implementation of TransactionStore.

use can_store::{StoreError, TransactionQuery, TransactionStore};
use can_types::{TransactionId, TransactionRecord};

use crate::environment::read_record;
use crate::{LmdbEnvironment, LmdbError};

impl TransactionStore for LmdbEnvironment {
    fn get_transaction(&self, id: TransactionId) -> Result<TransactionRecord, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        read_record::<TransactionRecord>(&self.transactions_db, &rtxn, &id.to_be_bytes())?
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))
    }

    /// Scans from the newest entry backwards until `limit` matches are found.
    fn recent_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut results = Vec::new();
        if query.limit == 0 {
            return Ok(results);
        }

        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let iter = self
            .transactions_db
            .rev_iter(&rtxn)
            .map_err(LmdbError::from)?;
        for entry in iter {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            let record: TransactionRecord =
                bincode::deserialize(val).map_err(LmdbError::from)?;
            if query.matches(&record) {
                results.push(record);
                if results.len() >= query.limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.transactions_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
