use std::fmt;
use std::sync::Arc;

/// Credentials attached to outgoing requests. Never mutated in place: every
/// change produces a new context, so a request keeps the exact credentials
/// it was sent with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    bearer: Option<Arc<str>>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::anonymous().with_bearer(token)
    }

    pub fn with_bearer(&self, token: impl AsRef<str>) -> Self {
        let token = token.as_ref().trim();
        Self {
            bearer: (!token.is_empty()).then(|| Arc::from(token)),
        }
    }

    pub fn without_bearer(&self) -> Self {
        Self::anonymous()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn authorization(&self) -> Option<String> {
        self.bearer_token().map(|t| format!("Bearer {t}"))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("bearer", &self.bearer.as_ref().map(|_| "REDACTED"))
            .finish()
    }
}
