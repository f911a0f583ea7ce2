use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::CoreError;
use crate::models::{Message, User};

/// Marks a message read. Only the recipient's read action counts; everyone
/// else is rejected. Reading has no effect on negotiation status.
pub async fn mark_read(
    pool: &SqlitePool,
    actor: &User,
    message_id: Uuid,
) -> Result<Message, CoreError> {
    let row = db::messages::get_message(pool, message_id)
        .await?
        .ok_or(CoreError::MessageNotFound(message_id))?;

    if row.recipient_id != actor.id {
        return Err(CoreError::Forbidden(
            "only the recipient may mark a message read",
        ));
    }

    if !row.is_read {
        db::messages::mark_read(pool, message_id).await?;
    }

    let row = db::messages::get_message(pool, message_id)
        .await?
        .ok_or(CoreError::MessageNotFound(message_id))?;

    Ok(Message::from(row))
}

/// Total unread messages addressed to the user, across all conversations.
pub async fn unread_count(pool: &SqlitePool, user_id: Uuid) -> Result<i64, CoreError> {
    Ok(db::messages::unread_count(pool, user_id).await?)
}
