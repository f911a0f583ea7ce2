use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::models::MessageStatus;

/// Everything the core can refuse to do, surfaced to the HTTP layer as a
/// tagged result. None of these are fatal to the process; each failure is
/// scoped to the request that raised it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("recipient {0} does not exist")]
    InvalidRecipient(Uuid),

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("proposal already resolved as {status}")]
    AlreadyResolved { status: MessageStatus },

    #[error("insufficient credits: {party} needs {required} but has {available}")]
    InsufficientCredits {
        party: Uuid,
        required: i64,
        available: i64,
    },

    #[error("settlement failed: {0}")]
    SettlementFailed(String),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid or missing token")]
    Unauthorized,

    #[error("failed to encode message content: {0}")]
    ContentEncoding(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl CoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::InvalidProposal(_)
            | CoreError::InvalidMessage(_)
            | CoreError::InsufficientCredits { .. }
            | CoreError::InvalidEmail => StatusCode::BAD_REQUEST,
            CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::InvalidRecipient(_)
            | CoreError::UserNotFound(_)
            | CoreError::MessageNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::AlreadyResolved { .. } | CoreError::EmailTaken => StatusCode::CONFLICT,
            CoreError::SettlementFailed(_)
            | CoreError::ContentEncoding(_)
            | CoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
