use can_types::CanAmount;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        needed: CanAmount,
        available: CanAmount,
    },

    #[error("conditional write failed: {0}")]
    Conflict(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("capacity reached: {0}")]
    CapacityReached(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
