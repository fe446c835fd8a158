//! Abstract storage traits for the CAN Network staking service.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! Read access is split per logical table (`profiles`, `staking_coin` /
//! `staking_nft`, `transactions`, `news_events` / `event_registrations`,
//! and the running ledger totals). Every write goes through [`StakingLedger`],
//! whose operations are each a single atomic unit: balance deltas, stake rows
//! and the matching transaction log entry commit together or not at all.

pub mod error;
pub mod ledger;
pub mod news;
pub mod profile;
pub mod stake;
pub mod stats;
pub mod transaction;

pub use error::StoreError;
pub use ledger::{
    BalanceChanged, ClaimSettled, ClaimSettlement, NewStake, StakeOpened, StakingLedger,
};
pub use news::{NewsQuery, NewsStore};
pub use profile::ProfileStore;
pub use stake::StakeStore;
pub use stats::StatsStore;
pub use transaction::{TransactionQuery, TransactionStore};
