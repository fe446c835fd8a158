//! LMDB storage backend for the CAN Network staking service.
//!
//! Implements every storage trait from `can-store` using the `heed` LMDB
//! bindings. All logical tables live in one environment, so each
//! [`can_store::StakingLedger`] operation is a single LMDB write transaction:
//! LMDB serializes writers, which makes balance deltas and the claim
//! compare-and-swap atomic without any extra locking.

pub mod environment;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod news;
pub mod profile;
pub mod stake;
pub mod stats;
pub mod transaction;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
