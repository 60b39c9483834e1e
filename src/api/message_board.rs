use super::notifications::NotificationsApi;
use super::{expect_success, path_segment, ApiError};
use crate::poller::{BoardFetcher, Notice};
use crate::session::{ApiRequest, SessionManager};
use crate::store::KeyValueStore;
use crate::transport::Transport;
use crate::types::{MessageBoard, MessageType, MessageUpdatePayload, NewMessagePayload};

/// `/message_board/{team}` and its messages. Messages are addressed by their
/// position in the server's list.
pub struct MessageBoardApi<T, S> {
    session: SessionManager<T, S>,
}

impl<T, S> Clone for MessageBoardApi<T, S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T: Transport, S: KeyValueStore + 'static> MessageBoardApi<T, S> {
    pub fn new(session: SessionManager<T, S>) -> Self {
        Self { session }
    }

    fn board_path(team_id: &str) -> Result<String, ApiError> {
        Ok(format!("/message_board/{}", path_segment(team_id)?))
    }

    fn message_path(team_id: &str, index: usize) -> Result<String, ApiError> {
        Ok(format!("{}/messages/{index}", Self::board_path(team_id)?))
    }

    pub async fn get_board(&self, team_id: &str) -> Result<MessageBoard, ApiError> {
        let request = ApiRequest::get(Self::board_path(team_id)?);
        let response = expect_success(self.session.send(request).await?)?;
        Ok(response.json()?)
    }

    pub async fn add_message(
        &self,
        team_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<(), ApiError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::InvalidInput("message content is empty"));
        }
        let creator_email = self
            .session
            .current_user()
            .map(|u| u.email)
            .ok_or(ApiError::InvalidInput("posting requires a signed-in user"))?;

        let payload = NewMessagePayload {
            content: content.to_string(),
            message_type,
            creator_email,
        };
        let path = format!("{}/messages", Self::board_path(team_id)?);
        expect_success(
            self.session
                .send(ApiRequest::post_json(path, &payload)?)
                .await?,
        )?;
        tracing::info!(team_id = %team_id, kind = message_type.label(), "message posted");
        Ok(())
    }

    pub async fn update_message(
        &self,
        team_id: &str,
        index: usize,
        update: &MessageUpdatePayload,
    ) -> Result<(), ApiError> {
        if update.content.is_none() && update.message_type.is_none() {
            return Err(ApiError::InvalidInput("nothing to update"));
        }
        let request = ApiRequest::put_json(Self::message_path(team_id, index)?, update)?;
        expect_success(self.session.send(request).await?)?;
        Ok(())
    }

    pub async fn delete_message(&self, team_id: &str, index: usize) -> Result<(), ApiError> {
        let request = ApiRequest::delete(Self::message_path(team_id, index)?);
        expect_success(self.session.send(request).await?)?;
        Ok(())
    }

    /// Posts a message, then pushes a notice to the team. The push is
    /// fire-and-forget: its failure is logged and does not fail the post.
    pub async fn post_and_announce(
        &self,
        notifications: &NotificationsApi<T, S>,
        team_id: &str,
        team_name: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<(), ApiError> {
        self.add_message(team_id, content, message_type).await?;

        let notice = Notice::new(message_type, content);
        notifications.announce(team_name, &notice).await;
        Ok(())
    }
}

impl<T: Transport, S: KeyValueStore + 'static> BoardFetcher for MessageBoardApi<T, S> {
    type Error = ApiError;

    async fn fetch_board(&self, team_id: &str) -> Result<MessageBoard, ApiError> {
        self.get_board(team_id).await
    }
}
