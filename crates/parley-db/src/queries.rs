use crate::Database;
use crate::hooks;
use crate::models::{ConversationRow, HistoryRow, MessageRow, NotificationRow, UserRow};
use crate::timestamp;
use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, params};

pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone_number: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: &'a str,
}

/// Partial profile update. `None` leaves the column as it is;
/// `phone_number: Some(None)` clears the phone number.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<Option<String>>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub parent_id: Option<String>,
    pub content: String,
}

/// Narrowing applied to a conversation's message listing.
#[derive(Debug, Default, Clone)]
pub struct MessageFilter {
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<String>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<String>,
    /// Case-insensitive substring of the sender's email, first or last name.
    pub sender: Option<String>,
}

impl Database {
    // -- Users --

    /// Inserts the user. Returns `false` when the email is already taken,
    /// which the UNIQUE constraint decides even under concurrent sign-ups.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, first_name, last_name, phone_number, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    user.email,
                    user.first_name,
                    user.last_name,
                    user.phone_number,
                    user.password_hash,
                    user.role,
                    timestamp()
                ],
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Returns the ids in `ids` that do not belong to any user.
    pub fn missing_users(&self, ids: &[String]) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT 1 FROM users WHERE id = ?1")?;
            let mut missing = Vec::new();
            for id in ids {
                if !stmt.exists([id])? {
                    missing.push(id.clone());
                }
            }
            Ok(missing)
        })
    }

    pub fn update_user(&self, id: &str, update: &UserUpdate) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    first_name   = COALESCE(?2, first_name),
                    last_name    = COALESCE(?3, last_name),
                    phone_number = CASE WHEN ?6 THEN ?4 ELSE phone_number END,
                    password     = COALESCE(?5, password)
                 WHERE id = ?1",
                params![
                    id,
                    update.first_name,
                    update.last_name,
                    update.phone_number.clone().flatten(),
                    update.password_hash,
                    update.phone_number.is_some()
                ],
            )?;
            query_user(conn, "id", id)
        })
    }

    pub fn set_user_role(&self, id: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET role = ?2 WHERE id = ?1", params![id, role])?;
            Ok(changed > 0)
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }

    /// One LIMIT/OFFSET page of users, oldest accounts first.
    pub fn list_users(&self, limit: u32, offset: u64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY created_at, rowid LIMIT ?1 OFFSET ?2",
                UserRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, offset as i64], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes the user and, through the user-deleted hook, every row that
    /// depends on them. Returns `false` if no such user exists.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let exists = tx.prepare("SELECT 1 FROM users WHERE id = ?1")?.exists([id])?;
            if !exists {
                return Ok(false);
            }
            hooks::on_user_deleted(tx, id)?;
            tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(true)
        })
    }

    // -- Conversations --

    pub fn create_conversation(&self, id: &str, participant_ids: &[String]) -> Result<ConversationRow> {
        self.with_tx(|tx| {
            let created_at = timestamp();
            tx.execute(
                "INSERT INTO conversations (id, created_at) VALUES (?1, ?2)",
                params![id, created_at],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                )?;
                for user_id in participant_ids {
                    stmt.execute(params![id, user_id])?;
                }
            }
            Ok(ConversationRow {
                id: id.to_string(),
                created_at,
            })
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, created_at FROM conversations WHERE id = ?1",
                [id],
                |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .prepare("SELECT 1 FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2")?
                .exists(params![conversation_id, user_id])?;
            Ok(found)
        })
    }

    pub fn conversation_participants(&self, conversation_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.email, u.first_name, u.last_name, u.phone_number, u.password, u.role, u.created_at
                 FROM conversation_participants p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.conversation_id = ?1
                 ORDER BY u.created_at, u.rowid",
            )?;
            let rows = stmt
                .query_map([conversation_id], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Conversations `user_id` takes part in, newest first.
    pub fn conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.created_at
                 FROM conversations c
                 JOIN conversation_participants p ON p.conversation_id = c.id
                 WHERE p.user_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Inserts the message and notifies its receiver in one transaction.
    pub fn insert_message(&self, message: &NewMessage) -> Result<MessageRow> {
        self.with_tx(|tx| {
            let row = MessageRow {
                id: message.id.clone(),
                conversation_id: message.conversation_id.clone(),
                sender_id: message.sender_id.clone(),
                receiver_id: message.receiver_id.clone(),
                parent_id: message.parent_id.clone(),
                content: message.content.clone(),
                edited: false,
                edited_at: None,
                edited_by: None,
                read: false,
                created_at: timestamp(),
            };
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, parent_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id,
                    row.conversation_id,
                    row.sender_id,
                    row.receiver_id,
                    row.parent_id,
                    row.content,
                    row.created_at
                ],
            )?;
            hooks::on_message_created(tx, &row)?;
            Ok(row)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn count_messages(&self, conversation_id: &str, filter: &MessageFilter) -> Result<u64> {
        self.with_conn(|conn| {
            let (clause, args) = filter_clause(conversation_id, filter);
            let sql = format!(
                "SELECT COUNT(*) FROM messages m JOIN users u ON u.id = m.sender_id WHERE {}",
                clause
            );
            let params: Vec<&dyn ToSql> = args.iter().map(|a| a as &dyn ToSql).collect();
            let count: i64 = conn.query_row(&sql, params.as_slice(), |r| r.get(0))?;
            Ok(count as u64)
        })
    }

    /// One LIMIT/OFFSET page of a conversation's messages, newest first.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        filter: &MessageFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let (clause, args) = filter_clause(conversation_id, filter);
            let sql = format!(
                "SELECT {} FROM messages m JOIN users u ON u.id = m.sender_id
                 WHERE {}
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT {} OFFSET {}",
                MessageRow::COLUMNS,
                clause,
                limit,
                offset
            );
            let params: Vec<&dyn ToSql> = args.iter().map(|a| a as &dyn ToSql).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replaces the content of a message, recording the previous version
    /// through the edit hook. Returns the message as stored afterwards.
    pub fn update_message_content(
        &self,
        id: &str,
        content: &str,
        editor_id: &str,
    ) -> Result<Option<MessageRow>> {
        self.with_tx(|tx| {
            let Some(original) = query_message(tx, id)? else {
                return Ok(None);
            };
            if hooks::on_message_edited(tx, &original, content, editor_id)? {
                tx.execute("UPDATE messages SET content = ?2 WHERE id = ?1", params![id, content])?;
            }
            query_message(tx, id)
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            hooks::on_message_deleted(tx, id)?;
            let deleted = tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    pub fn mark_message_read(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.execute("UPDATE messages SET read = 1 WHERE id = ?1", [id])?;
            query_message(conn, id)
        })
    }

    /// Unread messages received by `user_id`, newest first.
    pub fn unread_messages_for(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages m
                 WHERE m.receiver_id = ?1 AND m.read = 0
                 ORDER BY m.created_at DESC, m.rowid DESC",
                MessageRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The message `root_id` and all its transitive replies, oldest first.
    pub fn thread(&self, root_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "WITH RECURSIVE thread(id) AS (
                    SELECT id FROM messages WHERE id = ?1
                    UNION
                    SELECT r.id FROM messages r JOIN thread t ON r.parent_id = t.id
                 )
                 SELECT {} FROM messages m
                 WHERE m.id IN (SELECT id FROM thread)
                 ORDER BY m.created_at, m.rowid",
                MessageRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([root_id], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn message_history(&self, message_id: &str) -> Result<Vec<HistoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, old_content, edited_by, created_at
                 FROM message_history
                 WHERE message_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([message_id], |row| {
                    Ok(HistoryRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        old_content: row.get(2)?,
                        edited_by: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Notifications --

    pub fn notifications_for(&self, user_id: &str, unseen_only: bool) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, message_id, seen, created_at
                 FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR seen = 0)
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map(params![user_id, unseen_only], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                        seen: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Marks a notification seen, only if it belongs to `user_id`.
    pub fn mark_notification_seen(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET seen = 1 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", UserRow::COLUMNS, column);
    conn.query_row(&sql, [value], UserRow::from_row).optional()
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages m WHERE m.id = ?1", MessageRow::COLUMNS);
    conn.query_row(&sql, [id], MessageRow::from_row).optional()
}

/// WHERE clause over `messages m JOIN users u` plus its positional arguments.
fn filter_clause(conversation_id: &str, filter: &MessageFilter) -> (String, Vec<String>) {
    let mut conditions = vec!["m.conversation_id = ?1".to_string()];
    let mut args = vec![conversation_id.to_string()];

    if let Some(from) = &filter.created_from {
        args.push(from.clone());
        conditions.push(format!("m.created_at >= ?{}", args.len()));
    }
    if let Some(before) = &filter.created_before {
        args.push(before.clone());
        conditions.push(format!("m.created_at < ?{}", args.len()));
    }
    if let Some(sender) = &filter.sender {
        args.push(like_pattern(sender));
        let n = args.len();
        conditions.push(format!(
            "(lower(u.email) LIKE ?{n} ESCAPE '\\' OR lower(u.first_name) LIKE ?{n} ESCAPE '\\' \
             OR lower(u.last_name) LIKE ?{n} ESCAPE '\\')"
        ));
    }

    (conditions.join(" AND "), args)
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(db: &Database, email: &str, first_name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&NewUser {
            id: &id,
            email,
            first_name,
            last_name: "Tester",
            phone_number: Some("555-0100"),
            password_hash: "hash",
            role: "guest",
        })
        .unwrap();
        id
    }

    fn send(db: &Database, conversation: &str, from: &str, to: &str, content: &str, parent: Option<&str>) -> MessageRow {
        db.insert_message(&NewMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.to_string(),
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            parent_id: parent.map(str::to_string),
            content: content.to_string(),
        })
        .unwrap()
    }

    fn setup() -> (Database, String, String, String) {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice@example.com", "Alice");
        let bob = user(&db, "bob@example.com", "Bob");
        let conv = Uuid::new_v4().to_string();
        db.create_conversation(&conv, &[alice.clone(), bob.clone()]).unwrap();
        (db, alice, bob, conv)
    }

    #[test]
    fn users_round_trip_and_update() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "dana@example.com", "Dana");

        let by_email = db.get_user_by_email("dana@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.role, "guest");

        let updated = db
            .update_user(&id, &UserUpdate {
                last_name: Some("Scully".into()),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name, "Dana");
        assert_eq!(updated.last_name, "Scully");
        assert_eq!(updated.phone_number.as_deref(), Some("555-0100"));

        assert!(db.set_user_role(&id, "moderator").unwrap());
        assert_eq!(db.get_user_by_id(&id).unwrap().unwrap().role, "moderator");
    }

    #[test]
    fn duplicate_email_reports_taken() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "same@example.com", "One");
        let second_id = Uuid::new_v4().to_string();
        let inserted = db
            .create_user(&NewUser {
                id: &second_id,
                email: "same@example.com",
                first_name: "Two",
                last_name: "Tester",
                phone_number: None,
                password_hash: "hash",
                role: "guest",
            })
            .unwrap();
        assert!(!inserted);
        assert!(db.get_user_by_id(&second_id).unwrap().is_none());
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn phone_number_is_kept_unless_explicitly_cleared() {
        let db = Database::open_in_memory().unwrap();
        let id = user(&db, "eve@example.com", "Eve");

        let kept = db.update_user(&id, &UserUpdate::default()).unwrap().unwrap();
        assert_eq!(kept.phone_number.as_deref(), Some("555-0100"));

        let changed = db
            .update_user(&id, &UserUpdate {
                phone_number: Some(Some("555-0199".into())),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        assert_eq!(changed.phone_number.as_deref(), Some("555-0199"));

        let cleared = db
            .update_user(&id, &UserUpdate {
                phone_number: Some(None),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        assert_eq!(cleared.phone_number, None);
    }

    #[test]
    fn missing_users_lists_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        let known = user(&db, "known@example.com", "Known");
        let unknown = Uuid::new_v4().to_string();
        let missing = db.missing_users(&[known, unknown.clone()]).unwrap();
        assert_eq!(missing, vec![unknown]);
    }

    #[test]
    fn user_listing_pages_with_limit_and_offset() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            user(&db, &format!("user{}@example.com", i), "Paged");
        }
        assert_eq!(db.count_users().unwrap(), 5);

        let first = db.list_users(2, 0).unwrap();
        let second = db.list_users(2, 2).unwrap();
        let last = db.list_users(2, 4).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(last.len(), 1);
        assert_eq!(first[0].email, "user0@example.com");
        assert_eq!(last[0].email, "user4@example.com");
    }

    #[test]
    fn conversation_membership() {
        let (db, alice, bob, conv) = setup();
        let outsider = user(&db, "eve@example.com", "Eve");

        assert!(db.is_participant(&conv, &alice).unwrap());
        assert!(db.is_participant(&conv, &bob).unwrap());
        assert!(!db.is_participant(&conv, &outsider).unwrap());
        assert_eq!(db.conversation_participants(&conv).unwrap().len(), 2);
        assert_eq!(db.conversations_for_user(&alice).unwrap().len(), 1);
        assert!(db.conversations_for_user(&outsider).unwrap().is_empty());
    }

    #[test]
    fn messages_list_newest_first_with_pages() {
        let (db, alice, bob, conv) = setup();
        let sent: Vec<String> = (0..5)
            .map(|i| send(&db, &conv, &alice, &bob, &format!("m{}", i), None).id)
            .collect();

        let filter = MessageFilter::default();
        assert_eq!(db.count_messages(&conv, &filter).unwrap(), 5);

        let page = db.list_messages(&conv, &filter, 2, 0).unwrap();
        assert_eq!(page.iter().map(|m| m.id.clone()).collect::<Vec<_>>(), vec![sent[4].clone(), sent[3].clone()]);
        let tail = db.list_messages(&conv, &filter, 2, 4).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].id, sent[0]);
    }

    #[test]
    fn messages_filter_by_sender_and_date() {
        let (db, alice, bob, conv) = setup();
        send(&db, &conv, &alice, &bob, "from alice", None);
        send(&db, &conv, &bob, &alice, "from bob", None);

        let by_name = MessageFilter {
            sender: Some("ALI".into()),
            ..Default::default()
        };
        let rows = db.list_messages(&conv, &by_name, 20, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "from alice");

        let wildcard = MessageFilter {
            sender: Some("%".into()),
            ..Default::default()
        };
        assert_eq!(db.count_messages(&conv, &wildcard).unwrap(), 0);

        let future = MessageFilter {
            created_from: Some("9999-01-01".into()),
            ..Default::default()
        };
        assert_eq!(db.count_messages(&conv, &future).unwrap(), 0);

        let past = MessageFilter {
            created_before: Some("2000-01-01".into()),
            ..Default::default()
        };
        assert_eq!(db.count_messages(&conv, &past).unwrap(), 0);

        let window = MessageFilter {
            created_from: Some("2000-01-01".into()),
            created_before: Some("9999-01-01".into()),
            sender: None,
        };
        assert_eq!(db.count_messages(&conv, &window).unwrap(), 2);
    }

    #[test]
    fn unread_and_read_marking() {
        let (db, alice, bob, conv) = setup();
        let first = send(&db, &conv, &alice, &bob, "one", None);
        send(&db, &conv, &alice, &bob, "two", None);

        assert_eq!(db.unread_messages_for(&bob).unwrap().len(), 2);
        assert!(db.unread_messages_for(&alice).unwrap().is_empty());

        let read = db.mark_message_read(&first.id).unwrap().unwrap();
        assert!(read.read);
        let unread = db.unread_messages_for(&bob).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].content, "two");
    }

    #[test]
    fn thread_collects_nested_replies() {
        let (db, alice, bob, conv) = setup();
        let root = send(&db, &conv, &alice, &bob, "root", None);
        let reply = send(&db, &conv, &bob, &alice, "reply", Some(&root.id));
        let nested = send(&db, &conv, &alice, &bob, "nested", Some(&reply.id));
        send(&db, &conv, &alice, &bob, "elsewhere", None);

        let thread = db.thread(&root.id).unwrap();
        let ids: Vec<&str> = thread.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![root.id.as_str(), reply.id.as_str(), nested.id.as_str()]);

        assert_eq!(db.thread(&nested.id).unwrap().len(), 1);
    }

    #[test]
    fn notifications_can_be_marked_seen_by_owner_only() {
        let (db, alice, bob, conv) = setup();
        send(&db, &conv, &alice, &bob, "ping", None);
        let note = db.notifications_for(&bob, true).unwrap().remove(0);

        assert!(!db.mark_notification_seen(&note.id, &alice).unwrap());
        assert!(db.mark_notification_seen(&note.id, &bob).unwrap());
        assert!(db.notifications_for(&bob, true).unwrap().is_empty());
        assert_eq!(db.notifications_for(&bob, false).unwrap().len(), 1);
    }

    #[test]
    fn blank_content_violates_schema() {
        let (db, alice, bob, conv) = setup();
        let result = db.insert_message(&NewMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conv,
            sender_id: alice,
            receiver_id: bob.clone(),
            parent_id: None,
            content: "   ".into(),
        });
        assert!(result.is_err());
        // The notification insert rolled back with the message.
        assert!(db.notifications_for(&bob, false).unwrap().is_empty());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("A_b%"), "%a\\_b\\%%");
    }
}
