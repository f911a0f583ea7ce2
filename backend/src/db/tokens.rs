use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::User;

pub async fn insert_token(
    pool: &SqlitePool,
    token: &str,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO auth_tokens (token, user_id, created_at)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(token)
    .bind(user_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_user_by_token(
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.name, u.email, u.bio, u.avatar, u.credits, u.created_at, u.updated_at
        FROM auth_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token = ?1
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
