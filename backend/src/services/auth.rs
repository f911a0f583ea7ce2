use axum::http::{HeaderMap, header};
use rand::RngCore;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::constants::AUTH_TOKEN_BYTES;
use crate::db;
use crate::error::CoreError;
use crate::models::User;

fn generate_token() -> String {
    let mut bytes = [0u8; AUTH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues a fresh opaque bearer token for the user and stores it.
pub async fn issue_token(pool: &SqlitePool, user_id: Uuid) -> Result<String, CoreError> {
    let token = generate_token();
    db::tokens::insert_token(pool, &token, user_id).await?;
    Ok(token)
}

/// Resolves an `Authorization: Bearer` header to its user. Tokens are
/// opaque lookups; a deployment fronted by a real identity provider swaps
/// this function out at the handler boundary.
pub async fn resolve_bearer(pool: &SqlitePool, headers: &HeaderMap) -> Result<User, CoreError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(CoreError::Unauthorized)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(CoreError::Unauthorized)?;

    db::tokens::find_user_by_token(pool, token)
        .await?
        .ok_or(CoreError::Unauthorized)
}
