//! Credential lifecycle: login, logout, restore, refresh, and the
//! authenticated request path that retries once after a refresh.

mod context;
mod errors;
mod manager;
mod request;

pub use context::SessionContext;
pub use errors::{RefreshError, SessionError};
pub use manager::{
    AuthStatus, LogoutReason, SessionManager, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_INFO,
};
pub use request::{is_credential_entry_path, ApiRequest, Method, REFRESH_PATH};
