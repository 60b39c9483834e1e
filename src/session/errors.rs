use crate::store::StoreError;
use crate::transport::TransportError;
use thiserror::Error;

/// Why a refresh could not mint a new credential. Cloneable so one outcome
/// can be handed to every caller waiting on the same refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("no refresh token is stored")]
    NoRefreshToken,
    #[error("refresh rejected by server (status {status})")]
    Rejected { status: u16 },
    #[error("refresh request failed: {0}")]
    Network(String),
    #[error("refresh response was not a credential: {0}")]
    InvalidResponse(String),
    #[error("could not persist refreshed credential: {0}")]
    Storage(String),
    /// A login or logout happened while the refresh was in flight.
    #[error("session changed while refreshing")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),
    #[error("credential storage failed: {0}")]
    Storage(#[from] StoreError),
    #[error("user record could not be encoded: {0}")]
    UserRecord(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
