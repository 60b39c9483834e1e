use super::{expect_success, ApiError};
use crate::session::{ApiRequest, SessionManager};
use crate::store::KeyValueStore;
use crate::transport::{ApiResponse, Transport};
use crate::types::{
    ChangePasswordPayload, Credential, GoogleProfilePayload, LoginPayload, RegisterPayload,
    UserRecord,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The response carried a credential and the session now holds it.
    SignedIn(UserRecord),
    /// A team account was created; players and staff join with this code.
    TeamCreated { team_code: String },
    /// Registration succeeded without a credential; sign in next.
    RedirectToLogin,
    Accepted { message: String },
}

#[derive(Debug, Default, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    team_code: Option<String>,
    #[serde(default)]
    redirect: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthResponse {
    fn into_credential(self) -> Result<Credential, Self> {
        match (self.access_token, self.refresh_token, self.user) {
            (Some(access_token), Some(refresh_token), Some(user))
                if !access_token.is_empty() && !refresh_token.is_empty() =>
            {
                Ok(Credential {
                    access_token,
                    refresh_token,
                    user,
                })
            }
            (access_token, refresh_token, user) => Err(Self {
                access_token,
                refresh_token,
                user,
                ..self
            }),
        }
    }

    fn wants_redirect(&self) -> bool {
        match &self.redirect {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

fn reject_credentials(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if matches!(response.status, 400 | 401) {
        return Err(ApiError::CredentialRejected {
            status: response.status,
            message: response.error_message(),
        });
    }
    expect_success(response)
}

fn password_change(
    email: Option<String>,
    current_password: &str,
    new_password: &str,
) -> Result<ChangePasswordPayload, ApiError> {
    if current_password.is_empty() || new_password.is_empty() {
        return Err(ApiError::InvalidInput("both passwords are required"));
    }
    if current_password == new_password {
        return Err(ApiError::InvalidInput("new password must differ from the current one"));
    }
    Ok(ChangePasswordPayload {
        email,
        current_password: current_password.to_string(),
        new_password: new_password.to_string(),
    })
}

/// Credential-entry endpoints. A 400/401 here is a wrong credential and is
/// returned as-is, never answered with a refresh.
pub struct AuthApi<T, S> {
    session: SessionManager<T, S>,
}

impl<T: Transport, S: KeyValueStore + 'static> AuthApi<T, S> {
    pub fn new(session: SessionManager<T, S>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager<T, S> {
        &self.session
    }

    async fn enter(&self, request: ApiRequest) -> Result<AuthOutcome, ApiError> {
        let response = reject_credentials(self.session.send(request).await?)?;
        let body: AuthResponse = if response.body.trim().is_empty() {
            AuthResponse::default()
        } else {
            response.json()?
        };

        let body = match body.into_credential() {
            Ok(credential) => {
                self.session.login(&credential).await?;
                return Ok(AuthOutcome::SignedIn(credential.user));
            }
            Err(body) => body,
        };

        if let Some(team_code) = body.team_code.clone().filter(|c| !c.trim().is_empty()) {
            return Ok(AuthOutcome::TeamCreated { team_code });
        }
        if body.wants_redirect() {
            return Ok(AuthOutcome::RedirectToLogin);
        }
        Ok(AuthOutcome::Accepted {
            message: body.message.unwrap_or_default(),
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthOutcome, ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput("username and password are required"));
        }
        let payload = LoginPayload {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        self.enter(ApiRequest::post_json("/auth/login", &payload)?)
            .await
    }

    pub async fn register(&self, payload: &RegisterPayload) -> Result<AuthOutcome, ApiError> {
        self.enter(ApiRequest::post_json("/auth/register", payload)?)
            .await
    }

    /// Exchanges a Google ID token for a session.
    pub async fn google(&self, id_token: &str) -> Result<AuthOutcome, ApiError> {
        if id_token.trim().is_empty() {
            return Err(ApiError::InvalidInput("id token is required"));
        }
        let body = json!({ "id_token": id_token.trim() });
        self.enter(ApiRequest::post("/auth/google", Some(body)))
            .await
    }

    pub async fn complete_google_profile(
        &self,
        payload: &GoogleProfilePayload,
    ) -> Result<AuthOutcome, ApiError> {
        self.enter(ApiRequest::post_json("/auth/google/complete", payload)?)
            .await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let payload = password_change(None, current_password, new_password)?;
        self.put_password_change("/auth/change-password", &payload).await
    }

    /// Changes the password through the endpoint of the signed-in user's
    /// role, which also wants the account email.
    pub async fn change_password_for_role(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let user = self.session.current_user().ok_or(ApiError::InvalidInput("not signed in"))?;
        let path = if user.role().is_management() {
            "/management/change-password"
        } else {
            "/player/change-password"
        };
        let payload = password_change(Some(user.email), current_password, new_password)?;
        self.put_password_change(path, &payload).await
    }

    async fn put_password_change(
        &self,
        path: &str,
        payload: &ChangePasswordPayload,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::put_json(path, payload)?;
        reject_credentials(self.session.send(request).await?)?;
        tracing::info!(path, "password changed");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        Ok(self.session.logout().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Method, KEY_ACCESS_TOKEN, REFRESH_PATH};
    use crate::store::MemoryStore;
    use crate::test_support::{credential_json, Reply, ScriptedTransport};
    use std::sync::Arc;

    fn api(
        handler: impl Fn(&crate::test_support::RecordedCall) -> Reply + Send + Sync + 'static,
    ) -> (
        AuthApi<Arc<ScriptedTransport>, Arc<MemoryStore>>,
        Arc<ScriptedTransport>,
        Arc<MemoryStore>,
    ) {
        let transport = Arc::new(ScriptedTransport::new(handler));
        let store = Arc::new(MemoryStore::new());
        let session = SessionManager::new(transport.clone(), store.clone());
        (AuthApi::new(session), transport, store)
    }

    #[tokio::test]
    async fn login_with_credential_response_signs_in() {
        let (auth, transport, store) = api(|_| Reply::Json(200, credential_json("a1", "r1")));

        let outcome = auth.login("player@team.io", "secret").await.unwrap();
        assert!(matches!(outcome, AuthOutcome::SignedIn(ref u) if u.email == "player@team.io"));
        assert_eq!(store.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("a1"));
        assert_eq!(
            transport.calls()[0].body,
            Some(json!({"username": "player@team.io", "password": "secret"}))
        );
        assert!(auth.session().status().is_signed_in());
    }

    #[tokio::test]
    async fn rejected_login_surfaces_without_refresh() {
        let (auth, transport, store) =
            api(|_| Reply::Json(401, json!({"message": "Invalid username or password"})));

        let err = auth.login("player@team.io", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::CredentialRejected { status: 401, ref message } if message == "Invalid username or password"
        ));
        assert!(transport.calls_to(REFRESH_PATH).is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn registration_outcomes_follow_response_shape() {
        let (auth, _, _) = api(|call| match call.body.as_ref().and_then(|b| b.get("user_type")) {
            Some(t) if t == "team" => Reply::Json(201, json!({"team_code": "TIGERS"})),
            _ => Reply::Json(201, json!({"message": "Registration successful", "redirect": "/login"})),
        });

        let team = RegisterPayload {
            user_type: "team".to_string(),
            team_id: Some("TIGERS".to_string()),
            ..RegisterPayload::default()
        };
        assert_eq!(
            auth.register(&team).await.unwrap(),
            AuthOutcome::TeamCreated {
                team_code: "TIGERS".to_string()
            }
        );

        let player = RegisterPayload {
            username: Some("sam".to_string()),
            password: Some("secret1".to_string()),
            user_type: "player".to_string(),
            team_code: Some("TIGERS".to_string()),
            team_id: None,
        };
        assert_eq!(auth.register(&player).await.unwrap(), AuthOutcome::RedirectToLogin);
    }

    #[tokio::test]
    async fn completed_google_profile_with_credential_signs_in() {
        let (auth, transport, _) = api(|_| {
            let mut body = credential_json("a1", "r1");
            body["redirect"] = json!(true);
            Reply::Json(200, body)
        });
        let payload = GoogleProfilePayload {
            email: "player@team.io".to_string(),
            full_name: "Sam Player".to_string(),
            google_id: "g-123".to_string(),
            user_type: "player".to_string(),
            team_code: Some("TIGERS".to_string()),
            weight: Some(72.5),
            ..GoogleProfilePayload::default()
        };

        let outcome = auth.complete_google_profile(&payload).await.unwrap();
        assert!(matches!(outcome, AuthOutcome::SignedIn(_)));
        let sent = transport.calls()[0].body.clone().unwrap();
        assert_eq!(sent["weight"], json!(72.5));
        assert!(sent.get("birth_date").is_none());
    }

    #[tokio::test]
    async fn change_password_is_a_put_with_current_bearer() {
        let (auth, transport, _) = api(|call| match call.path.as_str() {
            "/auth/login" => Reply::Json(200, credential_json("a1", "r1")),
            _ => Reply::Json(400, json!({"message": "Current password is incorrect"})),
        });
        auth.login("player@team.io", "secret").await.unwrap();

        let err = auth.change_password("nope", "new-secret").await.unwrap_err();
        assert!(matches!(err, ApiError::CredentialRejected { status: 400, .. }));

        let call = &transport.calls_to("/auth/change-password")[0];
        assert_eq!(call.method, Method::Put);
        assert_eq!(call.bearer.as_deref(), Some("a1"));
        assert!(transport.calls_to(REFRESH_PATH).is_empty());
    }

    #[tokio::test]
    async fn role_password_change_targets_role_endpoint_with_email() {
        let (auth, transport, _) = api(|call| match call.path.as_str() {
            "/auth/login" => Reply::Json(200, credential_json("a1", "r1")),
            _ => Reply::Json(200, json!({"message": "Password updated"})),
        });
        let err = auth.change_password_for_role("old", "new").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        auth.login("player@team.io", "secret").await.unwrap();
        auth.change_password_for_role("old", "new").await.unwrap();

        let call = &transport.calls_to("/player/change-password")[0];
        assert_eq!(call.method, Method::Put);
        assert_eq!(
            call.body,
            Some(json!({
                "email": "player@team.io",
                "current_password": "old",
                "new_password": "new"
            }))
        );
        assert!(transport.calls_to("/auth/change-password").is_empty());
    }

    #[tokio::test]
    async fn unchanged_password_is_rejected_locally() {
        let (auth, transport, _) = api(|_| Reply::Json(200, credential_json("a1", "r1")));
        auth.login("player@team.io", "secret").await.unwrap();

        let err = auth.change_password("same", "same").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn blank_input_never_reaches_the_network() {
        let (auth, transport, _) = api(|_| Reply::Json(200, json!({})));
        assert!(matches!(
            auth.login(" ", "x").await,
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(auth.google("").await, Err(ApiError::InvalidInput(_))));
        assert!(transport.calls().is_empty());
    }
}
