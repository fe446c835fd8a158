//! Fundamental types for the CAN Network staking service.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! token amounts, timestamps, APY rates, identifiers, the persisted records
//! (profiles, stakes, transactions, news and event registrations), the
//! network statistics row and the staking policy parameters.

pub mod amount;
pub mod apy;
pub mod error;
pub mod ids;
pub mod news;
pub mod params;
pub mod profile;
pub mod stake;
pub mod stats;
pub mod time;
pub mod transaction;

pub use amount::CanAmount;
pub use apy::Apy;
pub use error::ParseError;
pub use ids::{AccountId, NewsId, StakeId, TransactionId};
pub use news::{EventRegistration, EventStatus, NewsDraft, NewsItem, NewsKind};
pub use params::{NftListing, StakingParams};
pub use profile::{MembershipTier, Profile};
pub use stake::{Stake, StakeAsset, StakeKind, StakeStatus};
pub use stats::{LedgerTotals, NetworkStats};
pub use time::{Clock, SystemClock, Timestamp};
pub use transaction::{TransactionKind, TransactionRecord, TransactionStatus};
