use crate::api::{ApiError, AuthApi, AuthOutcome, MessageBoardApi, NotificationsApi};
use crate::config::{Config, ConfigError, StoreBackend};
use crate::poller::{FreshnessPoller, PollerConfig, PollerHandle};
use crate::session::{LogoutReason, SessionError, SessionManager};
use crate::store::{FileStore, KeyValueStore, KeyringStore, StoreError, KEYRING_USER_SESSION};
use crate::transport::{HttpTransport, TransportError};
use crate::types::UserRecord;
use std::sync::Arc;

pub type SessionStore = Arc<dyn KeyValueStore>;
pub type AppSession = SessionManager<HttpTransport, SessionStore>;
pub type BoardApi = MessageBoardApi<HttpTransport, SessionStore>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no stored session and no CAMSPORTS_EMAIL/CAMSPORTS_PASSWORD to sign in with")]
    NotSignedIn,
    #[error("sign-in did not produce a session: {0}")]
    SignInIncomplete(String),
    #[error("signed-in user has no team; set CAMSPORTS_TEAM_ID")]
    NoTeam,
}

fn open_store(config: &Config) -> Result<SessionStore, AppError> {
    match config.store {
        StoreBackend::File => Ok(Arc::new(FileStore::open(config.store_path.clone())?)),
        StoreBackend::Keyring => {
            let store = KeyringStore::new(KEYRING_USER_SESSION);
            if !store.is_available() {
                return Err(StoreError::Keyring("no keychain backend available".to_string()).into());
            }
            Ok(Arc::new(store))
        }
    }
}

/// The client core wired against the real backend.
pub struct App {
    config: Config,
    session: AppSession,
    auth: AuthApi<HttpTransport, SessionStore>,
    board: BoardApi,
    notifications: NotificationsApi<HttpTransport, SessionStore>,
}

impl App {
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let store = open_store(&config)?;
        let transport = HttpTransport::new(&config.api_url, config.request_timeout)?;
        let session = SessionManager::with_logout_hook(transport, store, |reason| {
            if reason != LogoutReason::UserRequested {
                tracing::warn!(?reason, "session ended, sign in again");
            }
        });
        tracing::info!(api_url = %config.api_url, store = ?config.store, "client core ready");

        Ok(Self {
            auth: AuthApi::new(session.clone()),
            board: MessageBoardApi::new(session.clone()),
            notifications: NotificationsApi::new(session.clone()),
            session,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &AppSession {
        &self.session
    }

    pub fn auth(&self) -> &AuthApi<HttpTransport, SessionStore> {
        &self.auth
    }

    pub fn board(&self) -> &BoardApi {
        &self.board
    }

    pub fn notifications(&self) -> &NotificationsApi<HttpTransport, SessionStore> {
        &self.notifications
    }

    /// Restores the stored session, falling back to the configured
    /// credentials.
    pub async fn sign_in(&self) -> Result<UserRecord, AppError> {
        if let Some(user) = self.session.restore().await? {
            return Ok(user);
        }
        let (Some(email), Some(password)) = (&self.config.email, &self.config.password) else {
            return Err(AppError::NotSignedIn);
        };
        match self.auth.login(email, password).await? {
            AuthOutcome::SignedIn(user) => Ok(user),
            other => Err(AppError::SignInIncomplete(format!("{other:?}"))),
        }
    }

    pub fn poller_config(&self, user: &UserRecord) -> Result<PollerConfig, AppError> {
        let config = PollerConfig::for_user(user, self.config.team_id.as_deref(), self.config.poll_interval);
        if config.team_id.trim().is_empty() {
            return Err(AppError::NoTeam);
        }
        Ok(config)
    }

    pub fn start_poller(
        &self,
        user: &UserRecord,
    ) -> Result<(FreshnessPoller<BoardApi>, PollerHandle), AppError> {
        let poller = FreshnessPoller::new(self.board.clone(), self.poller_config(user)?);
        let handle = poller.start();
        Ok((poller, handle))
    }
}
