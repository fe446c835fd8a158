//! Staking errors.

use can_store::StoreError;
use can_types::{CanAmount, ParseError};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StakingError {
    #[error("no signed-in user")]
    Unauthenticated,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: need {needed}, available {available}")]
    InsufficientBalance {
        needed: CanAmount,
        available: CanAmount,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("accrued reward {pending} is below the claim threshold")]
    NothingToClaim { pending: CanAmount },

    #[error("store temporarily unavailable: {0}")]
    TransientStoreFailure(String),

    #[error("stored data is unreadable: {0}")]
    StoreCorrupted(String),

    #[error("invalid APY: {0}")]
    InvalidApy(String),

    #[error("unknown NFT {0}")]
    UnknownNft(String),

    #[error("NFT {0} is already staked")]
    AlreadyStaked(String),

    #[error("membership tier {requested} is not an upgrade")]
    TierNotUpgrade { requested: String },

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("invalid news item: {0}")]
    InvalidNews(String),

    #[error("already registered for event {0}")]
    AlreadyRegistered(String),

    #[error("{0}")]
    EventFull(String),

    #[error("registration for event {0} is closed")]
    RegistrationClosed(String),
}

impl StakingError {
    /// Stable machine-readable name, used as the `error` field of API
    /// responses and as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::NotFound(_) => "not_found",
            Self::NothingToClaim { .. } => "nothing_to_claim",
            Self::TransientStoreFailure(_) => "transient_store_failure",
            Self::StoreCorrupted(_) => "store_corrupted",
            Self::InvalidApy(_) => "invalid_apy",
            Self::UnknownNft(_) => "unknown_nft",
            Self::AlreadyStaked(_) => "already_staked",
            Self::TierNotUpgrade { .. } => "tier_not_upgrade",
            Self::InvalidUsername(_) => "invalid_username",
            Self::InvalidNews(_) => "invalid_news",
            Self::AlreadyRegistered(_) => "already_registered",
            Self::EventFull(_) => "event_full",
            Self::RegistrationClosed(_) => "registration_closed",
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStoreFailure(_))
    }
}

impl From<StoreError> for StakingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::InsufficientFunds { needed, available } => {
                Self::InsufficientBalance { needed, available }
            }
            StoreError::Duplicate(what) => Self::AlreadyStaked(what),
            StoreError::Overflow(what) => Self::InvalidAmount(what),
            StoreError::CapacityReached(what) => Self::EventFull(what),
            StoreError::Serialization(_) | StoreError::Corruption(_) => {
                Self::StoreCorrupted(e.to_string())
            }
            StoreError::Conflict(_) | StoreError::Backend(_) => {
                Self::TransientStoreFailure(e.to_string())
            }
        }
    }
}

/// Amount and rate parsing failures.
impl From<ParseError> for StakingError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::ApyOutOfRange(_) => Self::InvalidApy(e.to_string()),
            other => Self::InvalidAmount(other.to_string()),
        }
    }
}
