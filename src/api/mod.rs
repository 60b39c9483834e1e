//! Endpoint wrappers over the authenticated session.

mod auth;
mod message_board;
mod notifications;

pub use auth::{AuthApi, AuthOutcome};
pub use message_board::MessageBoardApi;
pub use notifications::{is_message_board_push, NotificationsApi, PUSH_DATA_TYPE_KEY};

use crate::session::{RefreshError, SessionError};
use crate::transport::{ApiResponse, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Wrong credentials on a credential-entry endpoint.
    #[error("credentials rejected ({status}): {message}")]
    CredentialRejected { status: u16, message: String },
    #[error("request failed ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        Self::Session(SessionError::Transport(e))
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        Self::Session(SessionError::RefreshFailed(e))
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::CredentialRejected { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the session was torn down because it could not be renewed.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Session(SessionError::RefreshFailed(_)))
    }
}

fn expect_success(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::Status {
        status: response.status,
        message: response.error_message(),
    })
}

fn path_segment(value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::InvalidInput("path segment is empty"));
    }
    Ok(urlencoding::encode(value).into_owned())
}
