use serde::Serialize;
use serde_json::Value;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Endpoints where a 401 means "wrong credentials" rather than "expired
/// token". They never trigger a refresh.
pub const CREDENTIAL_ENTRY_PATHS: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/google",
    "/auth/google/complete",
    "/auth/change-password",
    "/management/change-password",
    "/player/change-password",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

pub fn is_credential_entry_path(path: &str) -> bool {
    let path = normalize_path(path);
    CREDENTIAL_ENTRY_PATHS.contains(&path)
}

/// An outbound call plus how many times it has already been sent. Retrying
/// yields a new descriptor; the original is never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    attempt: u8,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            attempt: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::Post, path, body)
    }

    pub fn post_json<B: Serialize>(
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(Method::Post, path, Some(serde_json::to_value(body)?)))
    }

    pub fn put_json<B: Serialize>(
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(Method::Put, path, Some(serde_json::to_value(body)?)))
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }

    pub fn is_credential_entry(&self) -> bool {
        is_credential_entry_path(&self.path)
    }

    /// Whether a 401 on this request may be answered with refresh-and-retry.
    pub fn may_refresh_on_unauthorized(&self) -> bool {
        !self.is_retry()
            && !self.is_credential_entry()
            && normalize_path(&self.path) != REFRESH_PATH
    }

    pub fn retried(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_entry_paths_are_recognised_with_noise() {
        assert!(is_credential_entry_path("/auth/login"));
        assert!(is_credential_entry_path("/auth/google/complete/"));
        assert!(is_credential_entry_path("/auth/login?next=/"));
        assert!(!is_credential_entry_path("/auth/refresh"));
        assert!(!is_credential_entry_path("/message_board/t1"));
    }

    #[test]
    fn retried_bumps_attempt_without_touching_original() {
        let original = ApiRequest::get("/message_board/t1");
        let retry = original.retried();
        assert_eq!(original.attempt(), 0);
        assert_eq!(retry.attempt(), 1);
        assert_eq!(retry.path(), original.path());
        assert!(original.may_refresh_on_unauthorized());
        assert!(!retry.may_refresh_on_unauthorized());
    }

    #[test]
    fn refresh_and_login_never_refresh() {
        assert!(!ApiRequest::post(REFRESH_PATH, None).may_refresh_on_unauthorized());
        assert!(!ApiRequest::post("/auth/login", None).may_refresh_on_unauthorized());
    }
}
