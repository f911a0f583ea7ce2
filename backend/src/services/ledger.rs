use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::CoreError;

/// One side of a two-party exchange: `party` is debited `amount`.
#[derive(Debug, Clone, Copy)]
pub struct TransferLeg {
    pub party: Uuid,
    pub amount: i64,
}

pub async fn balance(conn: &mut SqliteConnection, user_id: Uuid) -> Result<i64, CoreError> {
    let credits = sqlx::query_scalar::<_, i64>("SELECT credits FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CoreError::UserNotFound(user_id))?;

    Ok(credits)
}

/// Adds credits to an account. Amounts are validated positive so a credit
/// can never smuggle in a debit.
pub async fn credit(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    amount: i64,
) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::SettlementFailed(format!(
            "refusing non-positive credit of {amount}"
        )));
    }

    let result = sqlx::query("UPDATE users SET credits = credits + ?1, updated_at = ?2 WHERE id = ?3")
        .bind(amount)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::UserNotFound(user_id));
    }

    Ok(())
}

/// Removes credits from an account. The balance check lives inside the
/// UPDATE predicate, so a concurrent spend cannot slip between check and
/// write and a committed balance can never go negative.
pub async fn debit(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    amount: i64,
) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::SettlementFailed(format!(
            "refusing non-positive debit of {amount}"
        )));
    }

    let result = sqlx::query(
        "UPDATE users SET credits = credits - ?1, updated_at = ?2 WHERE id = ?3 AND credits >= ?1",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available = balance(conn, user_id).await?;
        return Err(CoreError::InsufficientCredits {
            party: user_id,
            required: amount,
            available,
        });
    }

    Ok(())
}

/// Debits both legs of an exchange, or neither.
///
/// Legs are applied in sorted-party order so simultaneous exchanges sharing
/// a participant always touch balances in the same sequence. If the second
/// leg fails after the first applied, the first is compensated before the
/// error surfaces, so the caller never observes a half-applied transfer.
pub async fn transfer(
    conn: &mut SqliteConnection,
    a: TransferLeg,
    b: TransferLeg,
) -> Result<(), CoreError> {
    let (first, second) = if a.party <= b.party { (a, b) } else { (b, a) };

    debit(conn, first.party, first.amount).await?;

    if let Err(err) = debit(conn, second.party, second.amount).await {
        if let Err(undo_err) = credit(conn, first.party, first.amount).await {
            return Err(CoreError::SettlementFailed(format!(
                "could not reverse first leg after failed transfer ({err}): {undo_err}"
            )));
        }
        return Err(err);
    }

    Ok(())
}
