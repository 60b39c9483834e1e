use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Player,
    Management,
    Team,
    Unknown,
}

impl UserRole {
    pub fn from_user_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "player" => Self::Player,
            "management" | "coach" | "staff" => Self::Management,
            "team" => Self::Team,
            _ => Self::Unknown,
        }
    }

    pub fn is_management(self) -> bool {
        matches!(self, Self::Management)
    }
}

/// The authenticated principal as returned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct UserRecord {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub team_id: String,
}

impl UserRecord {
    pub fn role(&self) -> UserRole {
        UserRole::from_user_type(&self.user_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Announcement,
    Reminder,
    #[serde(other)]
    Other,
}

impl MessageType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Announcement => "announcement",
            Self::Reminder => "reminder",
            Self::Other => "message",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub creator_email: String,
    pub created_at: String,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct MessageBoard {
    pub team_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct NewMessagePayload {
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub creator_email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct MessageUpdatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
}

/// Body of `POST /notifications/send`. `to` is the team name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct PushNotificationPayload {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown> | null"))]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PushTokenRegistration {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct RegisterPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub user_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct GoogleProfilePayload {
    pub email: String,
    pub full_name: String,
    pub google_id: String,
    pub user_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS), ts(export))]
pub struct ChangePasswordPayload {
    /// Sent only to the role-specific endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_deserializes_backend_shape_without_id() {
        let json = serde_json::json!({
            "content": "Practice moved to 6pm",
            "type": "announcement",
            "creator_email": "coach@team.io",
            "created_at": "2025-03-01T17:00:00.123456",
            "last_updated": "2025-03-01T17:00:00.123456"
        });
        let message: Message = serde_json::from_value(json).unwrap();
        assert_eq!(message.message_type, MessageType::Announcement);
        assert_eq!(message.id, None);
        assert_eq!(message.created_at, "2025-03-01T17:00:00.123456");
    }

    #[test]
    fn unknown_message_type_maps_to_other() {
        let json = serde_json::json!({
            "content": "x",
            "type": "poll",
            "creator_email": "a@b.c",
            "created_at": "2025-03-01T17:00:00"
        });
        let message: Message = serde_json::from_value(json).unwrap();
        assert_eq!(message.message_type, MessageType::Other);
    }

    #[test]
    fn user_role_treats_coach_and_staff_as_management() {
        assert_eq!(UserRole::from_user_type("Management"), UserRole::Management);
        assert_eq!(UserRole::from_user_type("coach"), UserRole::Management);
        assert_eq!(UserRole::from_user_type("player"), UserRole::Player);
        assert_eq!(UserRole::from_user_type(""), UserRole::Unknown);
    }
}
