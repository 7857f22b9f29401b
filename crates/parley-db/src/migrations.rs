use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // No ON DELETE actions: dependent rows are removed by the hooks module,
        // so a missed dependency fails the delete instead of leaving orphans.
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                first_name      TEXT NOT NULL,
                last_name       TEXT NOT NULL,
                phone_number    TEXT,
                password        TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'guest'
                                CHECK (role IN ('guest', 'host', 'moderator', 'admin')),
                created_at      TEXT NOT NULL
            );

            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_created
                ON conversations(created_at);

            CREATE TABLE conversation_participants (
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (conversation_id, user_id)
            );

            CREATE INDEX idx_participants_user
                ON conversation_participants(user_id);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                receiver_id     TEXT NOT NULL REFERENCES users(id),
                parent_id       TEXT REFERENCES messages(id),
                content         TEXT NOT NULL CHECK (length(trim(content)) > 0),
                edited          INTEGER NOT NULL DEFAULT 0,
                edited_at       TEXT,
                edited_by       TEXT REFERENCES users(id),
                read            INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, created_at);
            CREATE INDEX idx_messages_sender ON messages(sender_id);
            CREATE INDEX idx_messages_receiver ON messages(receiver_id, read);
            CREATE INDEX idx_messages_parent ON messages(parent_id);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                message_id  TEXT NOT NULL REFERENCES messages(id),
                seen        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);
            CREATE INDEX idx_notifications_message
                ON notifications(message_id);

            CREATE TABLE message_history (
                id          TEXT PRIMARY KEY,
                message_id  TEXT NOT NULL REFERENCES messages(id),
                old_content TEXT NOT NULL,
                edited_by   TEXT REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_history_message
                ON message_history(message_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
