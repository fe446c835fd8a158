use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("corrupted record: {0}")]
    Corruption(String),
}

impl From<LmdbError> for can_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(key) => can_store::StoreError::NotFound(key),
            LmdbError::Serialization(e) => can_store::StoreError::Serialization(e.to_string()),
            LmdbError::Corruption(msg) => can_store::StoreError::Corruption(msg),
            other => can_store::StoreError::Backend(other.to_string()),
        }
    }
}
