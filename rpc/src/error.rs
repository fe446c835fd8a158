//! RPC error types and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use can_session::SessionError;
use can_staking::StakingError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Staking(#[from] StakingError),

    #[error("authentication failed: {0}")]
    Session(#[from] SessionError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} is disabled on this node")]
    Disabled(&'static str),

    #[error("server error: {0}")]
    Server(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl RpcError {
    /// Machine-readable error name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Staking(e) => e.kind(),
            Self::Session(_) => "unauthenticated",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Disabled(_) => "disabled",
            Self::Server(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Staking(e) => match e {
                StakingError::Unauthenticated => StatusCode::UNAUTHORIZED,
                StakingError::InvalidAmount(_)
                | StakingError::InvalidApy(_)
                | StakingError::UnknownNft(_)
                | StakingError::InvalidUsername(_)
                | StakingError::InvalidNews(_) => StatusCode::BAD_REQUEST,
                StakingError::InsufficientBalance { .. }
                | StakingError::NothingToClaim { .. }
                | StakingError::TierNotUpgrade { .. }
                | StakingError::AlreadyStaked(_)
                | StakingError::AlreadyRegistered(_)
                | StakingError::EventFull(_)
                | StakingError::RegistrationClosed(_) => StatusCode::CONFLICT,
                StakingError::NotFound(_) => StatusCode::NOT_FOUND,
                StakingError::TransientStoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                StakingError::StoreCorrupted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Session(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Disabled(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
