use axum::{
    Extension,
    extract::{OriginalUri, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use parley_db::UserUpdate;
use parley_types::api::{SetRoleRequest, UpdateUserRequest};
use parley_types::models::User;

use crate::auth::{MIN_PASSWORD_LEN, hash_password};
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::pagination::PageQuery;
use crate::state::{AppState, run_db};

pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.to_string();
    let row = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(convert::user(row)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = validate_update(req)?;

    let uid = user.id.to_string();
    let row = run_db(&state, move |db| db.update_user(&uid, &update))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    info!("{} updated their profile", user.email);
    Ok(Json(convert::user(row)))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.to_string();
    run_db(&state, move |db| db.delete_user(&uid)).await?;

    info!("{} deleted their account", user.email);
    Ok(StatusCode::NO_CONTENT)
}

// -- Admin --

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.resolve()?;

    let (count, rows) = run_db(&state, move |db| {
        let count = db.count_users()?;
        let rows = db.list_users(page.size, page.offset())?;
        Ok((count, rows))
    })
    .await?;
    page.check_in_range(count)?;

    let results: Vec<User> = rows.into_iter().map(convert::user).collect();
    Ok(Json(page.wrap(results, count, uri.path(), uri.query())))
}

pub async fn set_role(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(admin): Extension<CurrentUser>,
    Json(req): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let role = req.role;
    let row = run_db(&state, move |db| {
        if !db.set_user_role(&uid, role.as_str())? {
            return Ok(None);
        }
        db.get_user_by_id(&uid)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User does not exist."))?;

    info!("{} set role of {} to {}", admin.email, row.email, role);
    Ok(Json(convert::user(row)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(admin): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    if !run_db(&state, move |db| db.delete_user(&uid)).await? {
        return Err(ApiError::not_found("User does not exist."));
    }

    info!("{} deleted user {}", admin.email, user_id);
    Ok(StatusCode::NO_CONTENT)
}

fn validate_update(req: UpdateUserRequest) -> Result<UserUpdate, ApiError> {
    let name = |value: Option<String>| -> Result<Option<String>, ApiError> {
        match value {
            Some(v) if v.trim().is_empty() => Err(ApiError::bad_request("Names may not be blank.")),
            other => Ok(other.map(|v| v.trim().to_string())),
        }
    };
    let password_hash = match req.password {
        Some(p) if p.len() < MIN_PASSWORD_LEN => {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }
        Some(p) => Some(hash_password(&p)?),
        None => None,
    };

    Ok(UserUpdate {
        first_name: name(req.first_name)?,
        last_name: name(req.last_name)?,
        phone_number: req.phone_number,
        password_hash,
    })
}
