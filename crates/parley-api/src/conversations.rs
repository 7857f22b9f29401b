use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use parley_db::MessageFilter;
use parley_db::models::ConversationRow;
use parley_types::api::{ConversationDetail, CreateConversationRequest};
use parley_types::models::Conversation;

use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};

/// How many of the newest messages a conversation detail embeds.
const DETAIL_MESSAGE_LIMIT: u32 = 50;

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut participant_ids: Vec<String> = Vec::with_capacity(req.participant_ids.len() + 1);
    participant_ids.push(user.id.to_string());
    for id in req.participant_ids {
        let id = id.to_string();
        if !participant_ids.contains(&id) {
            participant_ids.push(id);
        }
    }
    if participant_ids.len() < 2 {
        return Err(ApiError::bad_request(
            "A conversation needs at least one other participant.",
        ));
    }

    let ids = participant_ids.clone();
    let missing = run_db(&state, move |db| db.missing_users(&ids)).await?;
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!("Unknown users: {}", missing.join(", "))));
    }

    let conversation_id = Uuid::new_v4().to_string();
    let row = run_db(&state, move |db| {
        db.create_conversation(&conversation_id, &participant_ids)
    })
    .await?;

    info!("Conversation {} opened by {}", row.id, user.email);

    let conversation = with_participants(&state, row).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id.to_string();
    let rows = run_db(&state, move |db| {
        let mut out = Vec::new();
        for row in db.conversations_for_user(&user_id)? {
            let participants = db.conversation_participants(&row.id)?;
            out.push((row, participants));
        }
        Ok(out)
    })
    .await?;

    let conversations: Vec<Conversation> = rows
        .into_iter()
        .map(|(row, participants)| convert::conversation(row, participants))
        .collect();

    Ok(Json(conversations))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_for_participant(&state, conversation_id, &user).await?;

    let cid = row.id.clone();
    let (participants, messages) = run_db(&state, move |db| {
        let participants = db.conversation_participants(&cid)?;
        let messages = db.list_messages(&cid, &MessageFilter::default(), DETAIL_MESSAGE_LIMIT, 0)?;
        Ok((participants, messages))
    })
    .await?;

    Ok(Json(ConversationDetail {
        id: conversation_id,
        participants: participants.into_iter().map(convert::user).collect(),
        messages: messages.into_iter().map(convert::message).collect(),
        created_at: convert::timestamp(&row.created_at),
    }))
}

/// Loads a conversation the caller takes part in: 404 if it does not exist,
/// 403 if the caller is not a participant.
pub(crate) async fn load_for_participant(
    state: &AppState,
    conversation_id: Uuid,
    user: &CurrentUser,
) -> Result<ConversationRow, ApiError> {
    let cid = conversation_id.to_string();
    let uid = user.id.to_string();
    let (row, member) = run_db(state, move |db| {
        let row = db.get_conversation(&cid)?;
        let member = db.is_participant(&cid, &uid)?;
        Ok((row, member))
    })
    .await?;

    let row = row.ok_or_else(|| ApiError::not_found("Conversation does not exist."))?;
    if !member {
        return Err(ApiError::forbidden("You are not a participant in this conversation."));
    }
    Ok(row)
}

async fn with_participants(state: &AppState, row: ConversationRow) -> Result<Conversation, ApiError> {
    let cid = row.id.clone();
    let participants = run_db(state, move |db| db.conversation_participants(&cid)).await?;
    Ok(convert::conversation(row, participants))
}
