//! Continuous-accrual staking.
//!
//! A stake earns simple interest from `staked_since` onwards:
//! `reward = principal × apy × elapsed / year`. The reward is never stored;
//! it is recomputed from the stake row whenever someone asks. Claiming pays
//! the reward into the owner's balance and restarts the window at the claim
//! time. The principal stays locked.
//!
//! This crate handles:
//! - Reward computation (pure, integer arithmetic)
//! - Coin and NFT stake creation
//! - Claims, safe against concurrent double payout
//! - Portfolio summaries, membership purchases and deposits
//! - News publication, event registration and network statistics
//! - A synchronous event bus for change notifications

pub mod accrual;
pub mod engine;
pub mod error;
pub mod events;
pub mod portfolio;

pub use accrual::{compute_reward, compute_reward_checked};
pub use engine::{
    validate_news, ClaimReceipt, RegistrationStatus, StakingEngine, MAX_NEWS_TITLE_LEN,
    MAX_USERNAME_LEN,
};
pub use error::StakingError;
pub use events::{EventBus, StakingEvent};
pub use portfolio::{KindSummary, Portfolio, StakeView};
