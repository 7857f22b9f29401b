use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{log_requests, require_auth, require_staff, restrict_chat_hours};
use crate::rate_limit::limit_posts;
use crate::state::AppState;
use crate::{auth, conversations, messages, notifications, users};

/// The full HTTP surface with every middleware applied.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/token", post(auth::obtain_token))
        .route("/auth/token/refresh", post(auth::refresh_token))
        .route("/auth/token/verify", post(auth::verify_token));

    let chat_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}",
            get(messages::get_message)
                .patch(messages::edit_message)
                .delete(messages::delete_message),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/read",
            post(messages::mark_read),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/history",
            get(messages::message_history),
        )
        .route(
            "/conversations/{conversation_id}/messages/{message_id}/thread",
            get(messages::message_thread),
        )
        .route("/messages/unread", get(messages::unread_messages))
        .layer(from_fn_with_state(state.clone(), restrict_chat_hours))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let account_routes = Router::new()
        .route(
            "/users/me",
            get(users::get_me).patch(users::update_me).delete(users::delete_me),
        )
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/{notification_id}/seen", post(notifications::mark_seen))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/{user_id}", delete(users::delete_user))
        .route("/admin/users/{user_id}/role", put(users::set_role))
        .layer(from_fn(require_staff))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .merge(account_routes)
        .merge(admin_routes)
        .layer(from_fn_with_state(state.clone(), limit_posts))
        .layer(from_fn_with_state(state.clone(), log_requests))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
