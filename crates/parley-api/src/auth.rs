use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;
use uuid::Uuid;

use parley_db::NewUser;
use parley_types::api::{
    AccessTokenResponse, Claims, RefreshRequest, RegisterRequest, TokenPairResponse, TokenRequest,
    TokenType, VerifyRequest,
};
use parley_types::models::Role;

use crate::error::ApiError;
use crate::extract::Json;
use crate::state::{AppState, run_db};

const ACCESS_TTL_SECS: i64 = 60 * 60;
const REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::bad_request("Enter a valid email address."));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::bad_request("First and last name are required."));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&req.password)?;
    let role = if state.settings.admin_emails.contains(&email) {
        Role::Admin
    } else {
        Role::Guest
    };
    let user_id = Uuid::new_v4();

    let insert_email = email.clone();
    let inserted = run_db(&state, move |db| {
        db.create_user(&NewUser {
            id: &user_id.to_string(),
            email: &insert_email,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            phone_number: req.phone_number.as_deref(),
            password_hash: &password_hash,
            role: role.as_str(),
        })
    })
    .await?;
    if !inserted {
        return Err(ApiError::Conflict("A user with this email already exists.".into()));
    }

    info!("Registered {} as {}", email, role);

    let tokens = token_pair(&state.settings.jwt_secret, user_id, &email)?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// Exchanges email and password for an access/refresh token pair.
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let user = run_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    verify_password(&req.password, &user.password)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

    Ok(Json(token_pair(&state.settings.jwt_secret, user_id, &user.email)?))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let secret = &state.settings.jwt_secret;
    let claims = decode_token(secret, &req.refresh)?;
    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized);
    }

    let access = create_token(secret, claims.sub, &claims.email, TokenType::Access)?;
    Ok(Json(AccessTokenResponse { access }))
}

pub async fn verify_token(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    decode_token(&state.settings.jwt_secret, &req.token)?;
    Ok(Json(serde_json::json!({})))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Unauthorized)
}

fn token_pair(secret: &str, user_id: Uuid, email: &str) -> Result<TokenPairResponse, ApiError> {
    Ok(TokenPairResponse {
        user_id,
        access: create_token(secret, user_id, email, TokenType::Access)?,
        refresh: create_token(secret, user_id, email, TokenType::Refresh)?,
    })
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    email: &str,
    token_type: TokenType,
) -> anyhow::Result<String> {
    let ttl = match token_type {
        TokenType::Access => ACCESS_TTL_SECS,
        TokenType::Refresh => REFRESH_TTL_SECS,
    };
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        token_type,
        exp: (chrono::Utc::now() + chrono::Duration::seconds(ttl)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_type() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "a@b.c", TokenType::Refresh).unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@b.c");
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_token("one", Uuid::new_v4(), "a@b.c", TokenType::Access).unwrap();
        assert!(matches!(decode_token("two", &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(verify_password("wrong horse", &hash), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
