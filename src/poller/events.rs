use crate::types::{Message, MessageType};

const NOTICE_BODY_MAX_CHARS: usize = 140;

/// Presentation-ready text for a new message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

fn truncate_body(content: &str) -> String {
    let content = content.trim();
    if content.chars().count() <= NOTICE_BODY_MAX_CHARS {
        return content.to_string();
    }
    let mut body: String = content.chars().take(NOTICE_BODY_MAX_CHARS - 1).collect();
    body.push('…');
    body
}

impl Notice {
    pub fn new(message_type: MessageType, content: &str) -> Self {
        let title = match message_type {
            MessageType::Announcement => "New announcement",
            MessageType::Reminder => "New reminder",
            MessageType::Other => "New message",
        };
        Self {
            title: title.to_string(),
            body: truncate_body(content),
        }
    }
}

pub fn notice_for(message: &Message) -> Notice {
    Notice::new(message.message_type, &message.content)
}

/// What the poller tells the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// The presented list changed. `messages` is most-recent-first.
    Updated {
        team_id: String,
        messages: Vec<Message>,
    },
    /// Fired at most once per message, only for viewers that get notices.
    NewMessage {
        team_id: String,
        message: Message,
        notice: Notice,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: MessageType, content: &str) -> Message {
        Message {
            id: None,
            content: content.to_string(),
            message_type: kind,
            creator_email: "coach@team.io".to_string(),
            created_at: "2025-03-01T17:00:00".to_string(),
            last_updated: None,
        }
    }

    #[test]
    fn notice_title_follows_message_type() {
        assert_eq!(
            notice_for(&message(MessageType::Announcement, "Game at 7")).title,
            "New announcement"
        );
        assert_eq!(
            notice_for(&message(MessageType::Reminder, "Bring jerseys")).title,
            "New reminder"
        );
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        let long = "é".repeat(NOTICE_BODY_MAX_CHARS + 20);
        let notice = notice_for(&message(MessageType::Announcement, &long));
        assert_eq!(notice.body.chars().count(), NOTICE_BODY_MAX_CHARS);
        assert!(notice.body.ends_with('…'));
    }
}
