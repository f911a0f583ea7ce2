use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{ConversationSummary, Message};
use crate::services::negotiation::{self, Decision};
use crate::services::read_state;
use crate::utils::conversation::conversation_key;

use super::{ApiError, AppState, error_response, require_user};

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub recipient_id: Uuid,
    pub skill_requested_id: Uuid,
    pub skill_offered_id: Uuid,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn create_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<Message>), (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let message = negotiation::propose(
        &state.pool,
        &state.events,
        &user,
        req.recipient_id,
        req.skill_requested_id,
        req.skill_offered_id,
        req.note,
    )
    .await
    .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    pub recipient_id: Uuid,
    pub content: String,
}

pub async fn send_chat_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendChatRequest>,
) -> Result<(StatusCode, Json<Message>), (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let message = negotiation::send_chat(
        &state.pool,
        &state.events,
        &user,
        req.recipient_id,
        req.content,
    )
    .await
    .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: Decision,
}

pub async fn respond_to_proposal(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Message>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    negotiation::respond(&state.pool, &state.events, &user, message_id, req.status)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Message>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    read_state::mark_read(&state.pool, &user, message_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// One entry per chat partner, newest activity first.
pub async fn get_chat_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let conversations = db::messages::list_conversations(&state.pool, user.id)
        .await
        .map_err(|err| error_response(CoreError::Database(err)))?;

    Ok(Json(conversations))
}

/// The full thread with one partner, oldest first. An unknown partner just
/// yields an empty thread.
pub async fn get_chat(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, (StatusCode, Json<ApiError>)> {
    let user = require_user(&state.pool, &headers).await?;

    let key = conversation_key(user.id, partner_id);
    let rows = db::messages::list_conversation(&state.pool, &key)
        .await
        .map_err(|err| error_response(CoreError::Database(err)))?;

    Ok(Json(rows.into_iter().map(Message::from).collect()))
}
