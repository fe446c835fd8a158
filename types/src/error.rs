//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("amount is empty")]
    EmptyAmount,

    #[error("amount must not be negative: {0}")]
    NegativeAmount(String),

    #[error("malformed amount: {0}")]
    MalformedAmount(String),

    #[error("amount has more than 6 decimal places: {0}")]
    TooPrecise(String),

    #[error("amount overflows: {0}")]
    AmountOverflow(String),

    #[error("APY must be between 0.01% and 1000%, got {0} bps")]
    ApyOutOfRange(u32),

    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("unknown membership tier: {0}")]
    UnknownTier(String),

    #[error("unknown stake asset: {0}")]
    UnknownAsset(String),

    #[error("unknown transaction kind: {0}")]
    UnknownTransactionKind(String),

    #[error("unknown news kind: {0}")]
    UnknownNewsKind(String),
}
