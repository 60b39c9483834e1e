//! The HTTP collaborator the session drives.

mod http;

pub use http::{HttpTransport, DEFAULT_REQUEST_TIMEOUT};

use crate::session::{ApiRequest, SessionContext};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Best-effort human readable error: the backend's `message` or `error`
    /// field, otherwise the raw status.
    pub fn error_message(&self) -> String {
        let from_body = serde_json::from_str::<Value>(&self.body).ok().and_then(|v| {
            ["message", "error"].iter().find_map(|k| {
                v.get(*k)
                    .and_then(|m| m.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
        });
        from_body.unwrap_or_else(|| format!("HTTP {}", self.status))
    }
}

pub trait Transport: Send + Sync + 'static {
    /// Sends `request` carrying the credentials in `context`. Any HTTP status
    /// is a successful exchange; only failing to get a response is an error.
    fn execute(
        &self,
        context: &SessionContext,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        context: &SessionContext,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        (**self).execute(context, request)
    }
}
