//! LMDB implementation of NewsStore.

use can_store::{NewsQuery, NewsStore, StoreError};
use can_types::{AccountId, NewsId, NewsItem};

use crate::environment::registration_key;
use crate::{LmdbEnvironment, LmdbError};

impl NewsStore for LmdbEnvironment {
    fn get_news(&self, id: NewsId) -> Result<NewsItem, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        self.news_in(&rtxn, id)?
            .ok_or_else(|| StoreError::NotFound(format!("news {id}")))
    }

    /// Walks the news table from the highest id down.
    fn recent_news(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, StoreError> {
        let mut results = Vec::new();
        if query.limit == 0 {
            return Ok(results);
        }

        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        for entry in self.news_db.rev_iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            let item: NewsItem = bincode::deserialize(val).map_err(LmdbError::from)?;
            if query.matches(&item) {
                results.push(item);
                if results.len() >= query.limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    fn news_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let count = self.news_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }

    fn is_registered(&self, event: NewsId, account: &AccountId) -> Result<bool, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let found = self
            .registrations_db
            .get(&rtxn, &registration_key(event, account))
            .map_err(LmdbError::from)?
            .is_some();
        Ok(found)
    }

    fn registration_count(&self, event: NewsId) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.registration_count_in(&rtxn, event)?)
    }
}
