use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{ConversationSummary, Message, MessageRow, MessageStatus};

const MESSAGE_COLUMNS: &str =
    "id, sender_id, recipient_id, conversation_key, content, status, is_read, created_at";

pub async fn insert_message(
    pool: &SqlitePool,
    sender_id: Uuid,
    recipient_id: Uuid,
    conversation_key: &str,
    content_json: &str,
    status: MessageStatus,
) -> Result<MessageRow, sqlx::Error> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (id, sender_id, recipient_id, conversation_key, content, status, is_read, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
        RETURNING id, sender_id, recipient_id, conversation_key, content, status, is_read, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sender_id)
    .bind(recipient_id)
    .bind(conversation_key)
    .bind(content_json)
    .bind(status)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_message(
    pool: &SqlitePool,
    message_id: Uuid,
) -> Result<Option<MessageRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, MessageRow>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
    ))
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Moves a message out of `pending` in one guarded statement. Returns false
/// if the row was not pending anymore, so a concurrent resolution loses the
/// race here instead of settling twice.
pub async fn claim_pending(
    conn: &mut SqliteConnection,
    message_id: Uuid,
    status: MessageStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE messages
        SET status = ?2
        WHERE id = ?1 AND status = 'pending'
        "#,
    )
    .bind(message_id)
    .bind(status)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_read(pool: &SqlitePool, message_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?1")
        .bind(message_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// All messages of one thread, oldest first. Chronological order is part of
/// the contract regardless of how storage returns rows.
pub async fn list_conversation(
    pool: &SqlitePool,
    conversation_key: &str,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MessageRow>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_key = ?1 ORDER BY created_at ASC"
    ))
    .bind(conversation_key)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn unread_count(pool: &SqlitePool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

struct ConversationGroup {
    partner_id: Uuid,
    last: MessageRow,
    unread_count: i64,
}

/// Groups every message the user participates in into per-partner threads:
/// newest message per thread plus the viewer's unread count. Threads come
/// back most-recently-active first.
pub async fn list_conversations(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<ConversationSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MessageRow>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE sender_id = ?1 OR recipient_id = ?1
        ORDER BY created_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<ConversationGroup> = Vec::new();

    for row in rows {
        let unread = row.recipient_id == user_id && !row.is_read;
        match index.get(&row.conversation_key).copied() {
            Some(i) => {
                if unread {
                    groups[i].unread_count += 1;
                }
            }
            None => {
                let partner_id = if row.sender_id == user_id {
                    row.recipient_id
                } else {
                    row.sender_id
                };
                index.insert(row.conversation_key.clone(), groups.len());
                groups.push(ConversationGroup {
                    partner_id,
                    last: row,
                    unread_count: unread as i64,
                });
            }
        }
    }

    let mut summaries = Vec::with_capacity(groups.len());
    for group in groups {
        let Some(partner) = crate::db::users::get_profile(pool, group.partner_id).await? else {
            continue;
        };
        summaries.push(ConversationSummary {
            partner,
            last_message: Message::from(group.last),
            unread_count: group.unread_count,
        });
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{MessageContent, User};
    use crate::utils::conversation::conversation_key;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrations::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn register(pool: &SqlitePool, name: &str, email: &str) -> User {
        db::users::create_user(pool, name, email, None, None)
            .await
            .unwrap()
    }

    async fn send(pool: &SqlitePool, from: &User, to: &User, text: &str) -> MessageRow {
        let key = conversation_key(from.id, to.id);
        let json = serde_json::to_string(&MessageContent::PlainText {
            text: text.to_string(),
        })
        .unwrap();
        insert_message(pool, from.id, to.id, &key, &json, MessageStatus::Completed)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_thread_is_chronological() {
        let pool = test_pool().await;
        let a = register(&pool, "Ada", "ada@example.com").await;
        let b = register(&pool, "Ben", "ben@example.com").await;

        send(&pool, &a, &b, "one").await;
        send(&pool, &b, &a, "two").await;
        send(&pool, &a, &b, "three").await;

        let key = conversation_key(a.id, b.id);
        let thread = list_conversation(&pool, &key).await.unwrap();

        let texts: Vec<String> = thread
            .into_iter()
            .map(|row| match Message::from(row).content {
                MessageContent::PlainText { text } => text,
                other => panic!("unexpected content {other:?}"),
            })
            .collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_conversation_grouping_and_unread_counts() {
        let pool = test_pool().await;
        let a = register(&pool, "Ada", "ada@example.com").await;
        let b = register(&pool, "Ben", "ben@example.com").await;
        let c = register(&pool, "Cay", "cay@example.com").await;

        send(&pool, &a, &b, "hello ben").await;
        let from_b = send(&pool, &b, &a, "hello ada").await;
        let from_c = send(&pool, &c, &a, "hi from cay").await;

        let conversations = list_conversations(&pool, a.id).await.unwrap();
        assert_eq!(conversations.len(), 2);

        // Most recently active thread first.
        assert_eq!(conversations[0].partner.id, c.id);
        assert_eq!(conversations[0].last_message.id, from_c.id);
        assert_eq!(conversations[0].unread_count, 1);

        assert_eq!(conversations[1].partner.id, b.id);
        assert_eq!(conversations[1].last_message.id, from_b.id);
        assert_eq!(conversations[1].unread_count, 1);

        assert_eq!(unread_count(&pool, a.id).await.unwrap(), 2);

        // Ada's own outgoing message counts as unread for Ben, not for Ada.
        let for_b = list_conversations(&pool, b.id).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].unread_count, 1);

        mark_read(&pool, from_b.id).await.unwrap();
        assert_eq!(unread_count(&pool, a.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_pending_has_a_single_winner() {
        let pool = test_pool().await;
        let a = register(&pool, "Ada", "ada@example.com").await;
        let b = register(&pool, "Ben", "ben@example.com").await;

        let key = conversation_key(a.id, b.id);
        let row = insert_message(&pool, a.id, b.id, &key, "{}", MessageStatus::Pending)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(
            claim_pending(&mut conn, row.id, MessageStatus::Accepted)
                .await
                .unwrap()
        );
        assert!(
            !claim_pending(&mut conn, row.id, MessageStatus::Declined)
                .await
                .unwrap()
        );
        drop(conn);

        let row = get_message(&pool, row.id).await.unwrap().unwrap();
        assert_eq!(row.status, MessageStatus::Accepted);
    }
}
