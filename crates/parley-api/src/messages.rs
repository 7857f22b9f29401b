use std::collections::HashMap;

use axum::{
    Extension,
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_db::{MessageFilter, NewMessage};
use parley_types::api::{EditMessageRequest, SendMessageRequest, ThreadNode};
use parley_types::models::{Message, MessageHistoryEntry};

use crate::conversations::load_for_participant;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::pagination::PageQuery;
use crate::state::{AppState, run_db};

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Inclusive, `YYYY-MM-DD`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`.
    pub end_date: Option<NaiveDate>,
    /// Substring of the sender's email or name.
    pub user: Option<String>,
}

impl MessageQuery {
    fn filter(&self) -> Result<MessageFilter, ApiError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ApiError::bad_request("start_date must not be after end_date."));
            }
        }
        let created_before = match self.end_date {
            Some(end) => Some(
                end.succ_opt()
                    .ok_or_else(|| ApiError::bad_request("end_date is out of range."))?
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            None => None,
        };
        Ok(MessageFilter {
            created_from: self.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            created_before,
            sender: self
                .user
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        })
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    OriginalUri(uri): OriginalUri,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve()?;
    let filter = query.filter()?;
    load_for_participant(&state, conversation_id, &user).await?;

    let cid = conversation_id.to_string();
    let (count, rows) = run_db(&state, move |db| {
        let count = db.count_messages(&cid, &filter)?;
        let rows = if page.offset() < count {
            db.list_messages(&cid, &filter, page.size, page.offset())?
        } else {
            Vec::new()
        };
        Ok((count, rows))
    })
    .await?;
    page.check_in_range(count)?;

    let results: Vec<Message> = rows.into_iter().map(convert::message).collect();
    Ok(Json(page.wrap(results, count, uri.path(), uri.query())))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content may not be blank."));
    }
    load_for_participant(&state, conversation_id, &user).await?;

    let cid = conversation_id.to_string();
    let receiver_id = req.receiver_id.to_string();
    let parent_id = req.parent_message_id.map(|id| id.to_string());
    let (receiver_ok, parent) = {
        let (cid, receiver_id, parent_id) = (cid.clone(), receiver_id.clone(), parent_id.clone());
        run_db(&state, move |db| {
            let receiver_ok = db.is_participant(&cid, &receiver_id)?;
            let parent = match parent_id {
                Some(id) => db.get_message(&id)?,
                None => None,
            };
            Ok((receiver_ok, parent))
        })
        .await?
    };

    if !receiver_ok {
        return Err(ApiError::bad_request(
            "Receiver is not a participant in this conversation.",
        ));
    }
    if parent_id.is_some() && parent.is_none_or(|p| p.conversation_id != cid) {
        return Err(ApiError::bad_request(
            "Parent message does not belong to this conversation.",
        ));
    }

    let new_message = NewMessage {
        id: Uuid::new_v4().to_string(),
        conversation_id: cid,
        sender_id: user.id.to_string(),
        receiver_id,
        parent_id,
        content: req.content,
    };
    let row = run_db(&state, move |db| db.insert_message(&new_message)).await?;

    debug!("Message {} from {} in {}", row.id, user.email, row.conversation_id);

    Ok((StatusCode::CREATED, Json(convert::message(row))))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_message(&state, conversation_id, message_id, &user).await?;
    Ok(Json(convert::message(row)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content may not be blank."));
    }
    load_message(&state, conversation_id, message_id, &user).await?;

    let mid = message_id.to_string();
    let editor = user.id.to_string();
    let row = run_db(&state, move |db| db.update_message_content(&mid, &req.content, &editor))
        .await?
        .ok_or_else(|| ApiError::not_found("Message does not exist."))?;

    Ok(Json(convert::message(row)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    load_message(&state, conversation_id, message_id, &user).await?;

    let mid = message_id.to_string();
    run_db(&state, move |db| db.delete_message(&mid)).await?;

    info!("Message {} deleted by {}", message_id, user.email);
    Ok(StatusCode::NO_CONTENT)
}

/// Only the receiver can mark a message read.
pub async fn mark_read(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_message(&state, conversation_id, message_id, &user).await?;
    if row.receiver_id != user.id.to_string() {
        return Err(ApiError::forbidden("Only the receiver can mark a message as read."));
    }

    let mid = message_id.to_string();
    let row = run_db(&state, move |db| db.mark_message_read(&mid))
        .await?
        .ok_or_else(|| ApiError::not_found("Message does not exist."))?;

    Ok(Json(convert::message(row)))
}

pub async fn message_history(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    load_message(&state, conversation_id, message_id, &user).await?;

    let mid = message_id.to_string();
    let rows = run_db(&state, move |db| db.message_history(&mid)).await?;

    let history: Vec<MessageHistoryEntry> = rows.into_iter().map(convert::history).collect();
    Ok(Json(history))
}

/// The message with its replies nested recursively.
pub async fn message_thread(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let root = load_message(&state, conversation_id, message_id, &user).await?;

    let mid = message_id.to_string();
    let rows = run_db(&state, move |db| db.thread(&mid)).await?;

    Ok(Json(build_thread(root, rows)))
}

pub async fn unread_messages(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.to_string();
    let rows = run_db(&state, move |db| db.unread_messages_for(&uid)).await?;

    let messages: Vec<Message> = rows.into_iter().map(convert::message).collect();
    Ok(Json(messages))
}

/// Loads a message of a conversation the caller takes part in.
async fn load_message(
    state: &AppState,
    conversation_id: Uuid,
    message_id: Uuid,
    user: &CurrentUser,
) -> Result<MessageRow, ApiError> {
    load_for_participant(state, conversation_id, user).await?;

    let mid = message_id.to_string();
    let row = run_db(state, move |db| db.get_message(&mid)).await?;
    match row {
        Some(row) if row.conversation_id == conversation_id.to_string() => Ok(row),
        _ => Err(ApiError::not_found("Message does not exist.")),
    }
}

/// Nests `rows` under `root` by parent id. Replies keep the order of `rows`.
fn build_thread(root: MessageRow, rows: Vec<MessageRow>) -> ThreadNode {
    let mut children: HashMap<String, Vec<MessageRow>> = HashMap::new();
    for row in rows {
        if row.id == root.id {
            continue;
        }
        if let Some(parent) = row.parent_id.clone() {
            children.entry(parent).or_default().push(row);
        }
    }
    nest(root, &mut children)
}

fn nest(row: MessageRow, children: &mut HashMap<String, Vec<MessageRow>>) -> ThreadNode {
    let replies = children
        .remove(&row.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| nest(child, children))
        .collect();
    ThreadNode {
        message: convert::message(row),
        replies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, parent: Option<&str>) -> MessageRow {
        MessageRow {
            id: id.to_string(),
            conversation_id: "c".into(),
            sender_id: "s".into(),
            receiver_id: "r".into(),
            parent_id: parent.map(str::to_string),
            content: id.to_string(),
            edited: false,
            edited_at: None,
            edited_by: None,
            read: false,
            created_at: "2026-10-16T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn thread_nests_replies_in_order() {
        let rows = vec![
            row("root", None),
            row("a", Some("root")),
            row("b", Some("root")),
            row("a1", Some("a")),
        ];
        let tree = build_thread(row("root", None), rows);

        assert_eq!(tree.message.content, "root");
        let top: Vec<&str> = tree.replies.iter().map(|n| n.message.content.as_str()).collect();
        assert_eq!(top, vec!["a", "b"]);
        assert_eq!(tree.replies[0].replies.len(), 1);
        assert_eq!(tree.replies[0].replies[0].message.content, "a1");
        assert!(tree.replies[1].replies.is_empty());
    }

    #[test]
    fn date_filter_covers_whole_end_day() {
        let query = MessageQuery {
            start_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 16),
            user: Some("  ".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.created_from.as_deref(), Some("2026-10-01"));
        assert_eq!(filter.created_before.as_deref(), Some("2026-10-17"));
        assert_eq!(filter.sender, None);
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let query = MessageQuery {
            start_date: NaiveDate::from_ymd_opt(2026, 10, 2),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            ..Default::default()
        };
        assert!(matches!(query.filter(), Err(ApiError::BadRequest(_))));
    }
}
