use super::{expect_success, ApiError};
use crate::poller::Notice;
use crate::session::{ApiRequest, SessionManager};
use crate::store::KeyValueStore;
use crate::transport::Transport;
use crate::types::{PushNotificationPayload, PushTokenRegistration};
use serde_json::{json, Value};

pub const PUSH_DATA_TYPE_KEY: &str = "type";
const PUSH_TYPE_MESSAGE_BOARD: &str = "message_board";

/// Whether a received push's data marks it as a board change.
pub fn is_message_board_push(data: &Value) -> bool {
    data.get(PUSH_DATA_TYPE_KEY).and_then(Value::as_str) == Some(PUSH_TYPE_MESSAGE_BOARD)
}

pub struct NotificationsApi<T, S> {
    session: SessionManager<T, S>,
}

impl<T, S> Clone for NotificationsApi<T, S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T: Transport, S: KeyValueStore + 'static> NotificationsApi<T, S> {
    pub fn new(session: SessionManager<T, S>) -> Self {
        Self { session }
    }

    pub async fn send_push(&self, payload: &PushNotificationPayload) -> Result<(), ApiError> {
        let request = ApiRequest::post_json("/notifications/send", payload)?;
        expect_success(self.session.send(request).await?)?;
        Ok(())
    }

    pub async fn register_push_token(&self, token: &str, user_id: &str) -> Result<(), ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::InvalidInput("push token is empty"));
        }
        let payload = PushTokenRegistration {
            token: token.trim().to_string(),
            user_id: user_id.to_string(),
        };
        let request = ApiRequest::post_json("/notifications/register", &payload)?;
        expect_success(self.session.send(request).await?)?;
        tracing::debug!("push token registered");
        Ok(())
    }

    /// Best-effort team push. Failures are logged, never returned.
    pub async fn announce(&self, team_name: &str, notice: &Notice) {
        let payload = PushNotificationPayload {
            to: team_name.to_string(),
            title: notice.title.clone(),
            body: notice.body.clone(),
            data: Some(json!({ PUSH_DATA_TYPE_KEY: PUSH_TYPE_MESSAGE_BOARD })),
        };
        if let Err(e) = self.send_push(&payload).await {
            tracing::warn!(team = %team_name, error = %e, "push notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{Reply, ScriptedTransport};
    use crate::types::MessageType;
    use std::sync::Arc;

    fn api(status: u16) -> (NotificationsApi<Arc<ScriptedTransport>, MemoryStore>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(move |_| Reply::Json(status, json!({}))));
        let session = SessionManager::new(transport.clone(), MemoryStore::new());
        (NotificationsApi::new(session), transport)
    }

    #[tokio::test]
    async fn push_token_registration_uses_camel_case() {
        let (api, transport) = api(200);
        api.register_push_token("ExponentPushToken[abc]", "u1").await.unwrap();
        assert_eq!(
            transport.calls()[0].body,
            Some(json!({"token": "ExponentPushToken[abc]", "userId": "u1"}))
        );
    }

    #[tokio::test]
    async fn announce_tags_push_as_board_change_and_swallows_errors() {
        let (api, transport) = api(502);
        api.announce("Tigers", &Notice::new(MessageType::Reminder, "Bring jerseys"))
            .await;

        let body = transport.calls_to("/notifications/send")[0].body.clone().unwrap();
        assert!(is_message_board_push(&body["data"]));
        assert!(!is_message_board_push(&json!({"type": "payment"})));
    }
}
