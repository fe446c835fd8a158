use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no signed-in user")]
    Unauthenticated,

    #[error("unknown session token")]
    UnknownToken,

    #[error("session expired")]
    Expired,

    #[error("malformed session token")]
    MalformedToken,

    #[error("could not generate session token: {0}")]
    TokenGeneration(String),
}
