use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] can_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] can_store_lmdb::LmdbError),

    #[error("staking error: {0}")]
    Staking(#[from] can_staking::StakingError),

    #[error("session error: {0}")]
    Session(#[from] can_session::SessionError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
