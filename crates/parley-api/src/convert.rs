//! Row-to-model conversion. Corrupt columns are logged and defaulted rather
//! than failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use parley_db::models::{ConversationRow, HistoryRow, MessageRow, NotificationRow, UserRow};
use parley_types::models::{Conversation, Message, MessageHistoryEntry, Notification, Role, User};

fn id(value: &str, column: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", column, value, e);
        Uuid::default()
    })
}

fn opt_id(value: Option<&str>, column: &str) -> Option<Uuid> {
    value.map(|v| id(v, column))
}

fn time(value: &str, column: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", column, value, e);
        DateTime::default()
    })
}

pub fn timestamp(value: &str) -> DateTime<Utc> {
    time(value, "created_at")
}

pub fn user(row: UserRow) -> User {
    let role = row.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("User {}: {}", row.id, e);
        Role::Guest
    });
    User {
        id: id(&row.id, "user id"),
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        phone_number: row.phone_number,
        role,
        created_at: time(&row.created_at, "user created_at"),
    }
}

pub fn conversation(row: ConversationRow, participants: Vec<UserRow>) -> Conversation {
    Conversation {
        id: id(&row.id, "conversation id"),
        participants: participants.into_iter().map(user).collect(),
        created_at: time(&row.created_at, "conversation created_at"),
    }
}

pub fn message(row: MessageRow) -> Message {
    Message {
        id: id(&row.id, "message id"),
        conversation_id: id(&row.conversation_id, "conversation_id"),
        sender_id: id(&row.sender_id, "sender_id"),
        receiver_id: id(&row.receiver_id, "receiver_id"),
        parent_message_id: opt_id(row.parent_id.as_deref(), "parent_id"),
        content: row.content,
        edited: row.edited,
        edited_at: row.edited_at.as_deref().map(|t| time(t, "edited_at")),
        edited_by: opt_id(row.edited_by.as_deref(), "edited_by"),
        read: row.read,
        created_at: time(&row.created_at, "message created_at"),
    }
}

pub fn notification(row: NotificationRow) -> Notification {
    Notification {
        id: id(&row.id, "notification id"),
        user_id: id(&row.user_id, "notification user_id"),
        message_id: id(&row.message_id, "notification message_id"),
        seen: row.seen,
        created_at: time(&row.created_at, "notification created_at"),
    }
}

pub fn history(row: HistoryRow) -> MessageHistoryEntry {
    MessageHistoryEntry {
        id: id(&row.id, "history id"),
        message_id: id(&row.message_id, "history message_id"),
        old_content: row.old_content,
        edited_by: opt_id(row.edited_by.as_deref(), "history edited_by"),
        created_at: time(&row.created_at, "history created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_timestamps() {
        let stored = time("2026-10-16T08:30:00.123456Z", "t");
        assert_eq!(stored.timestamp(), 1792139400);
        assert_eq!(stored.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        assert_eq!(id("not-a-uuid", "x"), Uuid::default());
        assert_eq!(time("yesterday", "x"), DateTime::<Utc>::default());
    }
}
