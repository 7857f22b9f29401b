//! Side effects of message and user lifecycle events.
//!
//! Each hook runs on the transaction of the write that triggered it, so a
//! failing hook rolls the triggering write back with it.

use anyhow::Result;
use rusqlite::{Transaction, params};
use tracing::debug;
use uuid::Uuid;

use crate::models::MessageRow;
use crate::timestamp;

/// A new message notifies its receiver.
pub fn on_message_created(tx: &Transaction<'_>, message: &MessageRow) -> Result<()> {
    tx.execute(
        "INSERT INTO notifications (id, user_id, message_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            Uuid::new_v4().to_string(),
            message.receiver_id,
            message.id,
            timestamp()
        ],
    )?;
    debug!("Notification queued for {} (message {})", message.receiver_id, message.id);
    Ok(())
}

/// Records the persisted content of `original` before it is replaced with
/// `new_content` and flags the message as edited.
///
/// Returns `false` without touching anything when the content is unchanged.
pub fn on_message_edited(
    tx: &Transaction<'_>,
    original: &MessageRow,
    new_content: &str,
    editor_id: &str,
) -> Result<bool> {
    if original.content == new_content {
        return Ok(false);
    }

    let now = timestamp();
    tx.execute(
        "INSERT INTO message_history (id, message_id, old_content, edited_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            Uuid::new_v4().to_string(),
            original.id,
            original.content,
            editor_id,
            now
        ],
    )?;
    tx.execute(
        "UPDATE messages SET edited = 1, edited_at = ?2, edited_by = ?3 WHERE id = ?1",
        params![original.id, now, editor_id],
    )?;
    Ok(true)
}

/// Clears every row that points at `message_id` so the message itself can go.
pub fn on_message_deleted(tx: &Transaction<'_>, message_id: &str) -> Result<()> {
    tx.execute("DELETE FROM notifications WHERE message_id = ?1", [message_id])?;
    tx.execute("DELETE FROM message_history WHERE message_id = ?1", [message_id])?;
    tx.execute("UPDATE messages SET parent_id = NULL WHERE parent_id = ?1", [message_id])?;
    Ok(())
}

/// Removes everything owned by or addressed to `user_id`: messages sent or
/// received (with their own dependents), notifications, and memberships.
/// Edits the user made to surviving rows keep their history, unattributed.
pub fn on_user_deleted(tx: &Transaction<'_>, user_id: &str) -> Result<()> {
    let message_ids: Vec<String> = {
        let mut stmt =
            tx.prepare("SELECT id FROM messages WHERE sender_id = ?1 OR receiver_id = ?1")?;
        stmt.query_map([user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    for id in &message_ids {
        on_message_deleted(tx, id)?;
        tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
    }

    tx.execute("DELETE FROM notifications WHERE user_id = ?1", [user_id])?;
    tx.execute("UPDATE messages SET edited_by = NULL WHERE edited_by = ?1", [user_id])?;
    tx.execute("UPDATE message_history SET edited_by = NULL WHERE edited_by = ?1", [user_id])?;
    tx.execute("DELETE FROM conversation_participants WHERE user_id = ?1", [user_id])?;

    debug!("Cascaded delete of user {}: {} messages", user_id, message_ids.len());
    Ok(())
}
