use super::{ApiRequest, RefreshError, SessionContext, SessionError, REFRESH_PATH};
use crate::store::KeyValueStore;
use crate::transport::{ApiResponse, Transport};
use crate::types::{Credential, UserRecord};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_USER_INFO: &str = "userInfo";

const SESSION_KEYS: [&str; 3] = [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_INFO];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    RefreshFailed,
    CorruptStoredSession,
    StorageFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut { reason: Option<LogoutReason> },
    SignedIn { user: UserRecord },
}

impl AuthStatus {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }

    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Self::SignedIn { user } => Some(user),
            Self::SignedOut { .. } => None,
        }
    }
}

/// The refresh endpoint may omit the user; the current one is kept then.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    user: Option<UserRecord>,
}

type LogoutHook = Arc<dyn Fn(LogoutReason) + Send + Sync>;
type RefreshFlight = Shared<BoxFuture<'static, Result<Credential, RefreshError>>>;

struct Inner<T, S> {
    transport: T,
    store: S,
    context: RwLock<SessionContext>,
    status: watch::Sender<AuthStatus>,
    refresh_flight: Mutex<Option<RefreshFlight>>,
    /// Bumped by every login and logout. A refresh only commits when the
    /// generation it started under is still current.
    generation: Mutex<u64>,
    on_logout: Option<LogoutHook>,
}

/// Owns the credential lifecycle and every authenticated call.
///
/// Cheap to clone; clones share one session.
pub struct SessionManager<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for SessionManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport, S: KeyValueStore + 'static> SessionManager<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self::build(transport, store, None)
    }

    /// `hook` runs on every logout, forced or requested; the UI uses it to
    /// route back to the sign-in screen.
    pub fn with_logout_hook(
        transport: T,
        store: S,
        hook: impl Fn(LogoutReason) + Send + Sync + 'static,
    ) -> Self {
        Self::build(transport, store, Some(Arc::new(hook)))
    }

    fn build(transport: T, store: S, on_logout: Option<LogoutHook>) -> Self {
        let (status, _) = watch::channel(AuthStatus::SignedOut { reason: None });
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                context: RwLock::new(SessionContext::anonymous()),
                status,
                refresh_flight: Mutex::new(None),
                generation: Mutex::new(0),
                on_logout,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub async fn context(&self) -> SessionContext {
        self.inner.context.read().await.clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.inner.status.subscribe()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.inner.status.borrow().user().cloned()
    }

    /// Rebuilds the session from storage without touching the network.
    pub async fn restore(&self) -> Result<Option<UserRecord>, SessionError> {
        let values = self.inner.store.get_many(&SESSION_KEYS)?;
        let mut values = values.into_iter();
        let access = values.next().flatten().filter(|t| !t.trim().is_empty());
        let _refresh = values.next().flatten();
        let user_info = values.next().flatten();

        let (Some(access), Some(user_info)) = (access, user_info) else {
            return Ok(None);
        };

        match serde_json::from_str::<UserRecord>(&user_info) {
            Ok(user) => {
                *self.inner.generation.lock().await += 1;
                self.inner.adopt(&access, user.clone()).await;
                tracing::info!(email = %user.email, "restored stored session");
                Ok(Some(user))
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored user record is unreadable, clearing session");
                self.inner.logout(LogoutReason::CorruptStoredSession).await?;
                Ok(None)
            }
        }
    }

    pub async fn login(&self, credential: &Credential) -> Result<(), SessionError> {
        self.inner.login(credential).await
    }

    pub async fn logout(&self) -> Result<(), SessionError> {
        self.inner.logout(LogoutReason::UserRequested).await
    }

    /// Mints a new credential from the stored refresh token. Concurrent
    /// callers share one request to the refresh endpoint and all observe its
    /// outcome. A failure signs the session out.
    pub async fn refresh(&self) -> Result<Credential, RefreshError> {
        self.inner.join_refresh().await
    }

    /// Sends `request` with the current access token. A 401 on a request
    /// that may refresh is answered by one refresh and exactly one retry;
    /// the retry's response is final whatever its status.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let context = self.context().await;
        let response = self.inner.transport.execute(&context, &request).await?;
        if !response.is_unauthorized() || !request.may_refresh_on_unauthorized() {
            return Ok(response);
        }

        tracing::debug!(path = %request.path(), "access token rejected, refreshing session");
        let token = self
            .inner
            .token_after_rejection(context.bearer_token())
            .await?;
        let retry = request.retried();
        let retry_context = context.with_bearer(&token);
        Ok(self.inner.transport.execute(&retry_context, &retry).await?)
    }
}

impl<T: Transport, S: KeyValueStore + 'static> Inner<T, S> {
    async fn adopt(&self, access_token: &str, user: UserRecord) {
        {
            let mut context = self.context.write().await;
            *context = context.with_bearer(access_token);
        }
        self.status.send_replace(AuthStatus::SignedIn { user });
    }

    async fn login(&self, credential: &Credential) -> Result<(), SessionError> {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.commit(credential).await
    }

    /// Persists the whole key group, then installs the bearer. Callers hold
    /// the generation lock.
    async fn commit(&self, credential: &Credential) -> Result<(), SessionError> {
        let user_info = serde_json::to_string(&credential.user)?;
        let written = self.store.set_many(&[
            (KEY_ACCESS_TOKEN, credential.access_token.as_str()),
            (KEY_REFRESH_TOKEN, credential.refresh_token.as_str()),
            (KEY_USER_INFO, user_info.as_str()),
        ]);

        if let Err(e) = written {
            tracing::error!(error = %e, "failed to persist credential");
            if let Err(cleanup) = self.store.remove_many(&SESSION_KEYS) {
                tracing::error!(
                    error = %cleanup,
                    "failed to clear stored credential, a previous session may be restored on next start"
                );
            }
            self.clear_in_memory(LogoutReason::StorageFailed).await;
            return Err(e.into());
        }

        self.adopt(&credential.access_token, credential.user.clone())
            .await;
        tracing::info!(email = %credential.user.email, "session established");
        Ok(())
    }

    async fn clear_in_memory(&self, reason: LogoutReason) -> bool {
        {
            let mut context = self.context.write().await;
            *context = context.without_bearer();
        }
        let previous = self
            .status
            .send_replace(AuthStatus::SignedOut { reason: Some(reason) });
        previous.is_signed_in()
    }

    async fn logout(&self, reason: LogoutReason) -> Result<(), SessionError> {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.end_session(generation, reason).await
    }

    /// Logs out for a failed refresh unless a login or logout happened since
    /// the refresh started.
    async fn logout_if_current(&self, started: u64, reason: LogoutReason) -> Result<(), SessionError> {
        let mut generation = self.generation.lock().await;
        if *generation != started {
            tracing::debug!(?reason, "session changed during refresh, keeping it");
            return Ok(());
        }
        *generation += 1;
        self.end_session(generation, reason).await
    }

    async fn end_session(
        &self,
        generation: MutexGuard<'_, u64>,
        reason: LogoutReason,
    ) -> Result<(), SessionError> {
        let removed = self.store.remove_many(&SESSION_KEYS);
        let was_signed_in = self.clear_in_memory(reason).await;
        drop(generation);
        if was_signed_in {
            tracing::info!(?reason, "signed out");
        }
        if let Some(hook) = &self.on_logout {
            hook(reason);
        }
        removed.map_err(Into::into)
    }

    async fn token_after_rejection(
        self: &Arc<Self>,
        rejected: Option<&str>,
    ) -> Result<String, RefreshError> {
        {
            let current = self.context.read().await;
            if let Some(token) = current.bearer_token() {
                if Some(token) != rejected {
                    return Ok(token.to_string());
                }
            }
        }
        Ok(self.join_refresh().await?.access_token)
    }

    async fn join_refresh(self: &Arc<Self>) -> Result<Credential, RefreshError> {
        let flight = {
            let mut slot = self.refresh_flight.lock().await;
            match slot.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    let flight = Arc::clone(self).run_refresh().boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    async fn run_refresh(self: Arc<Self>) -> Result<Credential, RefreshError> {
        let started = *self.generation.lock().await;
        let outcome = self.refresh_once(started).await;
        match &outcome {
            Err(RefreshError::Superseded) => {
                tracing::info!("session changed while refreshing, refreshed credential dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed, signing out");
                if let Err(store_err) = self
                    .logout_if_current(started, LogoutReason::RefreshFailed)
                    .await
                {
                    tracing::error!(error = %store_err, "failed to clear credential after refresh failure");
                }
            }
            Ok(_) => {}
        }
        self.refresh_flight.lock().await.take();
        outcome
    }

    async fn refresh_once(&self, started: u64) -> Result<Credential, RefreshError> {
        let refresh_token = self
            .store
            .get(KEY_REFRESH_TOKEN)
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .filter(|t| !t.trim().is_empty())
            .ok_or(RefreshError::NoRefreshToken)?;

        let context = SessionContext::bearer(&refresh_token);
        let request = ApiRequest::post(REFRESH_PATH, None);
        let response = self
            .transport
            .execute(&context, &request)
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;
        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        let parsed: RefreshResponse = response
            .json()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        let user = match parsed.user {
            Some(user) => user,
            None => self.status.borrow().user().cloned().ok_or_else(|| {
                RefreshError::InvalidResponse("response carries no user".to_string())
            })?,
        };
        let credential = Credential {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            user,
        };

        let generation = self.generation.lock().await;
        if *generation != started {
            return Err(RefreshError::Superseded);
        }
        self.commit(&credential)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        drop(generation);
        tracing::info!("session refreshed");
        Ok(credential)
    }
}
