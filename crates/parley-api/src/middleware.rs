use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::Timelike;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use parley_types::api::TokenType;
use parley_types::models::Role;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// The authenticated caller, as currently stored (not as the token claims).
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Validates the bearer access token and loads its user.
/// Tokens of deleted users are refused.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_token(&state.settings.jwt_secret, bearer.token())?;
    if claims.token_type != TokenType::Access {
        return Err(ApiError::Unauthorized);
    }

    let user_id = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let role = user
        .role
        .parse::<Role>()
        .map_err(|e| anyhow::anyhow!("User {}: {}", user.id, e))?;

    req.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        email: user.email,
        role,
    });
    Ok(next.run(req).await)
}

/// Admin and moderator only. Must run inside `require_auth`.
pub async fn require_staff(
    Extension(user): Extension<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.role.is_staff() {
        warn!("{} ({}) denied {}", user.email, user.role, req.uri().path());
        return Err(ApiError::forbidden("Only admin or moderator can access this route"));
    }
    Ok(next.run(req).await)
}

/// Closes chat routes outside the configured hours.
pub async fn restrict_chat_hours(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(hours) = state.settings.chat_hours {
        let hour = chrono::Local::now().hour();
        if !hours.is_open_at(hour) {
            return ApiError::forbidden(format!(
                "chat is closed outside {:02}:00 and {:02}:00",
                hours.start, hours.end
            ))
            .into_response();
        }
    }
    next.run(req).await
}

/// Logs every request with its user, and appends it to the request log file
/// when one is configured.
pub async fn log_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let user = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .and_then(|bearer| decode_token(&state.settings.jwt_secret, bearer.token()).ok())
        .map(|claims| claims.email)
        .unwrap_or_else(|| "anonymous".to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!(%method, %path, %user, "request");

    if let Some(log_path) = &state.settings.request_log {
        let line = format!("{} - User: {} - Path: {}\n", chrono::Utc::now().to_rfc3339(), user, path);
        if let Err(e) = append_line(log_path, &line).await {
            warn!("Failed to write request log {}: {}", log_path.display(), e);
        }
    }

    next.run(req).await
}

async fn append_line(path: &std::path::Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await
}
