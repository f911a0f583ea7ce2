use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::ProposalData;
use crate::services::ledger::{self, TransferLeg};

/// Executes the credit movement implied by an accepted proposal.
///
/// Each side pays for the skill it is receiving: the sender receives the
/// requested skill and pays its rate, the recipient receives the offered
/// skill and pays that one's rate. Both sides spend credits; this is not a
/// net transfer from one balance to the other.
pub async fn settle_acceptance(
    conn: &mut SqliteConnection,
    sender_id: Uuid,
    recipient_id: Uuid,
    proposal: &ProposalData,
) -> Result<(), CoreError> {
    let sender_pays = proposal.skill_requested.rate;
    let recipient_pays = proposal.skill_offered.rate;

    if sender_pays <= 0 || recipient_pays <= 0 {
        return Err(CoreError::InvalidProposal(
            "exchange rates must be positive".to_string(),
        ));
    }

    // Check both sides up front so a doomed exchange never touches a balance.
    let sender_balance = ledger::balance(conn, sender_id).await?;
    if sender_balance < sender_pays {
        return Err(CoreError::InsufficientCredits {
            party: sender_id,
            required: sender_pays,
            available: sender_balance,
        });
    }

    let recipient_balance = ledger::balance(conn, recipient_id).await?;
    if recipient_balance < recipient_pays {
        return Err(CoreError::InsufficientCredits {
            party: recipient_id,
            required: recipient_pays,
            available: recipient_balance,
        });
    }

    ledger::transfer(
        conn,
        TransferLeg {
            party: sender_id,
            amount: sender_pays,
        },
        TransferLeg {
            party: recipient_id,
            amount: recipient_pays,
        },
    )
    .await
}
