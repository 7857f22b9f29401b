//! Database row types. These map directly to SQLite rows and stay
//! independent of the parley-types API models.

use rusqlite::Row;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str =
        "id, email, first_name, last_name, phone_number, password, role, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            phone_number: row.get(4)?,
            password: row.get(5)?,
            role: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub edited: bool,
    pub edited_at: Option<String>,
    pub edited_by: Option<String>,
    pub read: bool,
    pub created_at: String,
}

impl MessageRow {
    pub(crate) const COLUMNS: &'static str = "m.id, m.conversation_id, m.sender_id, m.receiver_id, \
         m.parent_id, m.content, m.edited, m.edited_at, m.edited_by, m.read, m.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            receiver_id: row.get(3)?,
            parent_id: row.get(4)?,
            content: row.get(5)?,
            edited: row.get(6)?,
            edited_at: row.get(7)?,
            edited_by: row.get(8)?,
            read: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub message_id: String,
    pub seen: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: String,
    pub message_id: String,
    pub old_content: String,
    pub edited_by: Option<String>,
    pub created_at: String,
}
