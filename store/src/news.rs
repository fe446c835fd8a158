//! News and event registration storage trait.

use crate::StoreError;
use can_types::{AccountId, NewsId, NewsItem, NewsKind};

/// Filter for [`NewsStore::recent_news`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewsQuery {
    pub kind: Option<NewsKind>,
    pub featured_only: bool,
    /// Maximum number of rows returned. Zero means no rows.
    pub limit: usize,
}

impl NewsQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn matches(&self, item: &NewsItem) -> bool {
        self.kind.map_or(true, |k| item.kind == k) && (!self.featured_only || item.featured)
    }
}

/// Read access to the `news_events` and `event_registrations` tables.
pub trait NewsStore {
    fn get_news(&self, id: NewsId) -> Result<NewsItem, StoreError>;

    /// Matching items, newest first, at most `query.limit`.
    fn recent_news(&self, query: &NewsQuery) -> Result<Vec<NewsItem>, StoreError>;

    fn news_count(&self) -> Result<u64, StoreError>;

    fn is_registered(&self, event: NewsId, account: &AccountId) -> Result<bool, StoreError>;

    fn registration_count(&self, event: NewsId) -> Result<u64, StoreError>;
}
