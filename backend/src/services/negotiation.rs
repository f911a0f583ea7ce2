use sqlx::SqlitePool;
use uuid::Uuid;

use crate::constants::{CHAT_MESSAGE_CHAR_LIMIT, MIN_SKILL_RATE, NOTE_CHAR_LIMIT};
use crate::db;
use crate::error::CoreError;
use crate::models::{
    Message, MessageContent, MessageStatus, NoticeData, ProposalData, SkillKind, SkillSnapshot,
    User,
};
use crate::services::events::{EventHub, MessageEvent, MessageEventKind};
use crate::services::settlement;
use crate::utils::conversation::conversation_key;

/// A terminal decision on a pending proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Declined,
}

/// Creates an exchange proposal: a pending message whose content snapshots
/// the two skills being traded.
pub async fn propose(
    pool: &SqlitePool,
    events: &EventHub,
    sender: &User,
    recipient_id: Uuid,
    skill_requested_id: Uuid,
    skill_offered_id: Uuid,
    note: Option<String>,
) -> Result<Message, CoreError> {
    if recipient_id == sender.id {
        return Err(CoreError::InvalidRecipient(recipient_id));
    }
    let recipient = db::users::get_user_by_id(pool, recipient_id)
        .await?
        .ok_or(CoreError::InvalidRecipient(recipient_id))?;

    let proposal = build_proposal(
        pool,
        sender,
        &recipient,
        skill_requested_id,
        skill_offered_id,
        note,
    )
    .await?;

    let message = store_message(
        pool,
        events,
        sender.id,
        recipient.id,
        &MessageContent::ExchangeProposal(proposal),
        MessageStatus::Pending,
    )
    .await?;

    tracing::info!(
        message_id = %message.id,
        sender = %sender.id,
        recipient = %recipient.id,
        "exchange proposal created"
    );

    Ok(message)
}

/// Sends an ordinary chat message. Plain chat carries no negotiation, so it
/// is stored with the neutral terminal status.
pub async fn send_chat(
    pool: &SqlitePool,
    events: &EventHub,
    sender: &User,
    recipient_id: Uuid,
    text: String,
) -> Result<Message, CoreError> {
    if recipient_id == sender.id {
        return Err(CoreError::InvalidRecipient(recipient_id));
    }
    if text.trim().is_empty() {
        return Err(CoreError::InvalidMessage("empty message".to_string()));
    }
    if text.chars().count() > CHAT_MESSAGE_CHAR_LIMIT {
        return Err(CoreError::InvalidMessage(format!(
            "message exceeds {CHAT_MESSAGE_CHAR_LIMIT} characters"
        )));
    }
    if db::users::get_user_by_id(pool, recipient_id).await?.is_none() {
        return Err(CoreError::InvalidRecipient(recipient_id));
    }

    store_message(
        pool,
        events,
        sender.id,
        recipient_id,
        &MessageContent::PlainText { text },
        MessageStatus::Completed,
    )
    .await
}

/// Resolves a pending proposal. Only the recipient may do this, and only
/// once; accepting runs settlement inside the same database transaction as
/// the status change, so the transition commits together with the credit
/// movement or not at all.
pub async fn respond(
    pool: &SqlitePool,
    events: &EventHub,
    actor: &User,
    message_id: Uuid,
    decision: Decision,
) -> Result<Message, CoreError> {
    let row = db::messages::get_message(pool, message_id)
        .await?
        .ok_or(CoreError::MessageNotFound(message_id))?;

    if row.recipient_id != actor.id {
        return Err(CoreError::Forbidden(
            "only the recipient may resolve a proposal",
        ));
    }
    if row.status != MessageStatus::Pending {
        return Err(CoreError::AlreadyResolved { status: row.status });
    }

    let message = Message::from(row);
    let Some(proposal) = message.content.as_proposal() else {
        return Err(CoreError::InvalidProposal(
            "message does not carry an exchange proposal".to_string(),
        ));
    };

    let new_status = match decision {
        Decision::Accepted => MessageStatus::Accepted,
        Decision::Declined => MessageStatus::Declined,
    };

    let mut tx = pool.begin().await?;

    // Claim the pending row first; a concurrent resolution loses the race
    // here instead of settling twice.
    if !db::messages::claim_pending(&mut tx, message_id, new_status).await? {
        tx.rollback().await?;
        let status = db::messages::get_message(pool, message_id)
            .await?
            .map(|m| m.status)
            .unwrap_or(MessageStatus::Pending);
        return Err(CoreError::AlreadyResolved { status });
    }

    if decision == Decision::Accepted {
        if let Err(err) =
            settlement::settle_acceptance(&mut tx, message.sender_id, message.recipient_id, proposal)
                .await
        {
            // Rolling back leaves the message pending so the recipient can
            // retry once the balances allow it.
            tracing::warn!(message_id = %message_id, error = %err, "settlement failed, proposal stays pending");
            tx.rollback().await?;
            return Err(err);
        }
    }

    tx.commit().await?;

    tracing::info!(
        message_id = %message_id,
        status = %new_status,
        "proposal resolved"
    );

    let row = db::messages::get_message(pool, message_id)
        .await?
        .ok_or(CoreError::MessageNotFound(message_id))?;
    let resolved = Message::from(row);

    events.publish(MessageEvent {
        kind: MessageEventKind::Updated,
        conversation_key: resolved.conversation_key.clone(),
        message: resolved.clone(),
    });

    record_resolution_notice(pool, events, actor, &resolved, decision).await?;

    Ok(resolved)
}

async fn build_proposal(
    pool: &SqlitePool,
    sender: &User,
    recipient: &User,
    skill_requested_id: Uuid,
    skill_offered_id: Uuid,
    note: Option<String>,
) -> Result<ProposalData, CoreError> {
    let requested = db::skills::get_skill(pool, skill_requested_id)
        .await?
        .ok_or_else(|| {
            CoreError::InvalidProposal(format!("requested skill {skill_requested_id} does not exist"))
        })?;
    if requested.user_id != recipient.id || requested.kind != SkillKind::Offered {
        return Err(CoreError::InvalidProposal(
            "requested skill is not offered by the recipient".to_string(),
        ));
    }

    let offered = db::skills::get_skill(pool, skill_offered_id)
        .await?
        .ok_or_else(|| {
            CoreError::InvalidProposal(format!("offered skill {skill_offered_id} does not exist"))
        })?;
    if offered.user_id != sender.id || offered.kind != SkillKind::Offered {
        return Err(CoreError::InvalidProposal(
            "offered skill is not offered by the sender".to_string(),
        ));
    }

    if requested.rate < MIN_SKILL_RATE || offered.rate < MIN_SKILL_RATE {
        return Err(CoreError::InvalidProposal(
            "exchange rates must be positive".to_string(),
        ));
    }

    if let Some(note) = &note {
        if note.chars().count() > NOTE_CHAR_LIMIT {
            return Err(CoreError::InvalidProposal(format!(
                "note exceeds {NOTE_CHAR_LIMIT} characters"
            )));
        }
    }

    Ok(ProposalData {
        skill_requested: SkillSnapshot::from(&requested),
        skill_offered: SkillSnapshot::from(&offered),
        note,
    })
}

/// Records the outcome as a system message in the thread, so a reader sees
/// the resolution even with no live transport attached.
async fn record_resolution_notice(
    pool: &SqlitePool,
    events: &EventHub,
    actor: &User,
    resolved: &Message,
    decision: Decision,
) -> Result<(), CoreError> {
    let text = match decision {
        Decision::Accepted => format!(
            "Great! {} has accepted your skill exchange request. You can now chat freely to coordinate your sessions.",
            actor.name
        ),
        Decision::Declined => format!("{} has declined your skill exchange request.", actor.name),
    };

    store_message(
        pool,
        events,
        actor.id,
        resolved.sender_id,
        &MessageContent::SystemNotice(NoticeData {
            text,
            exchange_status: resolved.status,
        }),
        MessageStatus::Completed,
    )
    .await?;

    Ok(())
}

async fn store_message(
    pool: &SqlitePool,
    events: &EventHub,
    sender_id: Uuid,
    recipient_id: Uuid,
    content: &MessageContent,
    status: MessageStatus,
) -> Result<Message, CoreError> {
    let key = conversation_key(sender_id, recipient_id);
    let json = serde_json::to_string(content)?;
    let row =
        db::messages::insert_message(pool, sender_id, recipient_id, &key, &json, status).await?;
    let message = Message::from(row);

    events.publish(MessageEvent {
        kind: MessageEventKind::Created,
        conversation_key: message.conversation_key.clone(),
        message: message.clone(),
    });

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Skill;
    use crate::services::ledger;
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

    async fn register(pool: &SqlitePool, name: &str, email: &str, credits: i64) -> User {
        let user = db::users::create_user(pool, name, email, None, None)
            .await
            .unwrap();
        if credits > 0 {
            let mut conn = pool.acquire().await.unwrap();
            ledger::credit(&mut conn, user.id, credits).await.unwrap();
        }
        user
    }

    async fn offered_skill(pool: &SqlitePool, user: &User, name: &str, rate: i64) -> Skill {
        db::skills::add_skill(
            pool,
            user.id,
            SkillKind::Offered,
            name,
            "General",
            None,
            rate,
            Default::default(),
        )
        .await
        .unwrap()
    }

    async fn balance_of(pool: &SqlitePool, user_id: Uuid) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        ledger::balance(&mut conn, user_id).await.unwrap()
    }

    /// A (5 credits) offers guitar at rate 1 and requests B's web dev at
    /// rate 2; B accepts.
    async fn guitar_for_web_dev(
        pool: &SqlitePool,
        events: &EventHub,
        a_credits: i64,
        b_credits: i64,
    ) -> (User, User, Message) {
        let a = register(pool, "Ada", "ada@example.com", a_credits).await;
        let b = register(pool, "Ben", "ben@example.com", b_credits).await;
        let guitar = offered_skill(pool, &a, "Guitar Lessons", 1).await;
        let web_dev = offered_skill(pool, &b, "Web Development", 2).await;

        let message = propose(
            pool,
            events,
            &a,
            b.id,
            web_dev.id,
            guitar.id,
            Some("Trade?".to_string()),
        )
        .await
        .unwrap();

        (a, b, message)
    }

    #[tokio::test]
    async fn test_propose_creates_pending_proposal() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, b, message) = guitar_for_web_dev(&pool, &events, 5, 5).await;

        assert_eq!(message.status, MessageStatus::Pending);
        assert_eq!(message.sender_id, a.id);
        assert_eq!(message.recipient_id, b.id);
        assert_eq!(message.conversation_key, conversation_key(a.id, b.id));

        let proposal = message.content.as_proposal().unwrap();
        assert_eq!(proposal.skill_requested.name, "Web Development");
        assert_eq!(proposal.skill_requested.rate, 2);
        assert_eq!(proposal.skill_offered.name, "Guitar Lessons");
        assert_eq!(proposal.skill_offered.rate, 1);
    }

    #[tokio::test]
    async fn test_propose_rejects_unknown_recipient() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;
        let guitar = offered_skill(&pool, &a, "Guitar Lessons", 1).await;

        let err = propose(&pool, &events, &a, Uuid::new_v4(), guitar.id, guitar.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecipient(_)));
    }

    #[tokio::test]
    async fn test_propose_rejects_self_exchange() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;
        let guitar = offered_skill(&pool, &a, "Guitar Lessons", 1).await;

        let err = propose(&pool, &events, &a, a.id, guitar.id, guitar.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecipient(_)));
    }

    #[tokio::test]
    async fn test_propose_rejects_foreign_or_missing_skills() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;
        let b = register(&pool, "Ben", "ben@example.com", 0).await;
        let c = register(&pool, "Cay", "cay@example.com", 0).await;
        let guitar = offered_skill(&pool, &a, "Guitar Lessons", 1).await;
        let web_dev = offered_skill(&pool, &b, "Web Development", 2).await;
        let painting = offered_skill(&pool, &c, "Painting", 1).await;

        // Requested skill does not exist
        let err = propose(&pool, &events, &a, b.id, Uuid::new_v4(), guitar.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidProposal(_)));

        // Requested skill belongs to a third user, not the recipient
        let err = propose(&pool, &events, &a, b.id, painting.id, guitar.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidProposal(_)));

        // Offered skill is not the sender's
        let err = propose(&pool, &events, &a, b.id, web_dev.id, web_dev.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidProposal(_)));
    }

    #[tokio::test]
    async fn test_accept_settles_both_sides() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, b, message) = guitar_for_web_dev(&pool, &events, 5, 4).await;

        let resolved = respond(&pool, &events, &b, message.id, Decision::Accepted)
            .await
            .unwrap();

        assert_eq!(resolved.status, MessageStatus::Accepted);
        // A pays for what A receives (web dev at rate 2), B pays for the
        // guitar lessons at rate 1.
        assert_eq!(balance_of(&pool, a.id).await, 3);
        assert_eq!(balance_of(&pool, b.id).await, 3);
    }

    #[tokio::test]
    async fn test_accept_with_broke_sender_leaves_proposal_pending() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, b, message) = guitar_for_web_dev(&pool, &events, 0, 4).await;

        let err = respond(&pool, &events, &b, message.id, Decision::Accepted)
            .await
            .unwrap_err();

        match err {
            CoreError::InsufficientCredits {
                party,
                required,
                available,
            } => {
                assert_eq!(party, a.id);
                assert_eq!(required, 2);
                assert_eq!(available, 0);
            }
            other => panic!("expected InsufficientCredits, got {other:?}"),
        }

        let row = db::messages::get_message(&pool, message.id).await.unwrap().unwrap();
        assert_eq!(row.status, MessageStatus::Pending);
        assert_eq!(balance_of(&pool, a.id).await, 0);
        assert_eq!(balance_of(&pool, b.id).await, 4);
    }

    #[tokio::test]
    async fn test_accept_with_broke_recipient_leaves_balances_untouched() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, b, message) = guitar_for_web_dev(&pool, &events, 5, 0).await;

        let err = respond(&pool, &events, &b, message.id, Decision::Accepted)
            .await
            .unwrap_err();
        match err {
            CoreError::InsufficientCredits { party, .. } => assert_eq!(party, b.id),
            other => panic!("expected InsufficientCredits, got {other:?}"),
        }

        let row = db::messages::get_message(&pool, message.id).await.unwrap().unwrap();
        assert_eq!(row.status, MessageStatus::Pending);
        assert_eq!(balance_of(&pool, a.id).await, 5);
        assert_eq!(balance_of(&pool, b.id).await, 0);
    }

    #[tokio::test]
    async fn test_decline_is_terminal_and_free() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, b, message) = guitar_for_web_dev(&pool, &events, 5, 4).await;

        let resolved = respond(&pool, &events, &b, message.id, Decision::Declined)
            .await
            .unwrap();

        assert_eq!(resolved.status, MessageStatus::Declined);
        assert_eq!(balance_of(&pool, a.id).await, 5);
        assert_eq!(balance_of(&pool, b.id).await, 4);
    }

    #[tokio::test]
    async fn test_resolution_is_single_shot() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (_a, b, message) = guitar_for_web_dev(&pool, &events, 5, 4).await;

        respond(&pool, &events, &b, message.id, Decision::Declined)
            .await
            .unwrap();

        let err = respond(&pool, &events, &b, message.id, Decision::Accepted)
            .await
            .unwrap_err();
        match err {
            CoreError::AlreadyResolved { status } => assert_eq!(status, MessageStatus::Declined),
            other => panic!("expected AlreadyResolved, got {other:?}"),
        }

        // Status is unchanged by the second attempt.
        let row = db::messages::get_message(&pool, message.id).await.unwrap().unwrap();
        assert_eq!(row.status, MessageStatus::Declined);
    }

    #[tokio::test]
    async fn test_only_the_recipient_may_respond() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, _b, message) = guitar_for_web_dev(&pool, &events, 5, 4).await;
        let c = register(&pool, "Cay", "cay@example.com", 10).await;

        for actor in [&a, &c] {
            for decision in [Decision::Accepted, Decision::Declined] {
                let err = respond(&pool, &events, actor, message.id, decision)
                    .await
                    .unwrap_err();
                assert!(matches!(err, CoreError::Forbidden(_)));
            }
        }
    }

    #[tokio::test]
    async fn test_respond_to_missing_message_is_not_found() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;

        let err = respond(&pool, &events, &a, Uuid::new_v4(), Decision::Declined)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MessageNotFound(_)));
    }

    #[tokio::test]
    async fn test_respond_to_plain_chat_is_rejected() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;
        let b = register(&pool, "Ben", "ben@example.com", 0).await;

        let chat = send_chat(&pool, &events, &a, b.id, "hi!".to_string())
            .await
            .unwrap();
        assert_eq!(chat.status, MessageStatus::Completed);

        let err = respond(&pool, &events, &b, chat.id, Decision::Accepted)
            .await
            .unwrap_err();
        // Chat messages are born in a terminal status.
        assert!(matches!(err, CoreError::AlreadyResolved { .. }));
    }

    #[tokio::test]
    async fn test_resolution_records_a_system_notice() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let (a, b, message) = guitar_for_web_dev(&pool, &events, 5, 4).await;

        respond(&pool, &events, &b, message.id, Decision::Accepted)
            .await
            .unwrap();

        let key = conversation_key(a.id, b.id);
        let thread = db::messages::list_conversation(&pool, &key).await.unwrap();
        let last = Message::from(thread.last().unwrap().clone());

        match last.content {
            MessageContent::SystemNotice(notice) => {
                assert_eq!(notice.exchange_status, MessageStatus::Accepted);
                assert!(notice.text.contains("Ben"));
            }
            other => panic!("expected a system notice, got {other:?}"),
        }
        // The notice goes from the responder back to the proposer.
        assert_eq!(last.sender_id, b.id);
        assert_eq!(last.recipient_id, a.id);
    }

    #[tokio::test]
    async fn test_chat_events_reach_subscribers() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;
        let b = register(&pool, "Ben", "ben@example.com", 0).await;

        let mut rx = events.subscribe();
        send_chat(&pool, &events, &a, b.id, "hello".to_string())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, MessageEventKind::Created);
        assert_eq!(event.conversation_key, conversation_key(a.id, b.id));
    }

    #[tokio::test]
    async fn test_send_chat_validates_input() {
        let pool = test_pool().await;
        let events = EventHub::new();
        let a = register(&pool, "Ada", "ada@example.com", 0).await;
        let b = register(&pool, "Ben", "ben@example.com", 0).await;

        let err = send_chat(&pool, &events, &a, b.id, "   ".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidMessage(_)));

        let err = send_chat(&pool, &events, &a, Uuid::new_v4(), "hi".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecipient(_)));
    }
}
