use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::CoreError;
use crate::models::User;
use crate::services::events::EventHub;
use crate::utils::Config;

pub mod messages;
pub mod users;

pub use messages::{
    create_proposal, get_chat, get_chat_list, mark_message_read, respond_to_proposal,
    send_chat_message,
};
pub use users::{add_skill, browse_skills, list_my_skills, me, register, remove_skill};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub events: EventHub,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub fn error_response(err: CoreError) -> (StatusCode, Json<ApiError>) {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("request failed: {err}");
    }
    (
        status,
        Json(ApiError {
            error: err.to_string(),
        }),
    )
}

/// Resolves the bearer token every authenticated handler starts with.
pub(crate) async fn require_user(
    pool: &SqlitePool,
    headers: &HeaderMap,
) -> Result<User, (StatusCode, Json<ApiError>)> {
    crate::services::auth::resolve_bearer(pool, headers)
        .await
        .map_err(error_response)
}
