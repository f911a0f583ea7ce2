use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::users::{Skill, SkillLevel, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Accepted,
    Declined,
    Completed,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Accepted => "accepted",
            MessageStatus::Declined => "declined",
            MessageStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a skill captured when a proposal is created, so later edits
/// to the live skill row do not change the terms of an open offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSnapshot {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub rate: i64,
    pub level: SkillLevel,
}

impl From<&Skill> for SkillSnapshot {
    fn from(skill: &Skill) -> Self {
        Self {
            id: skill.id,
            name: skill.name.clone(),
            category: skill.category.clone(),
            rate: skill.rate,
            level: skill.level,
        }
    }
}

/// The structured payload of an exchange proposal. `skill_requested` is a
/// skill the recipient offers; `skill_offered` is one the sender offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalData {
    pub skill_requested: SkillSnapshot,
    pub skill_offered: SkillSnapshot,
    #[serde(default)]
    pub note: Option<String>,
}

/// Body of a system-generated reply recorded when a proposal is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeData {
    pub text: String,
    pub exchange_status: MessageStatus,
}

/// Message body, stored as tagged JSON in the `content` column. The
/// discriminator strings are part of the wire format clients match on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageContent {
    #[serde(rename = "text")]
    PlainText { text: String },
    #[serde(rename = "skill_exchange_request")]
    ExchangeProposal(ProposalData),
    #[serde(rename = "system_message")]
    SystemNotice(NoticeData),
}

impl MessageContent {
    /// Decodes a stored content column. Anything that is not valid tagged
    /// JSON (legacy rows, foreign writers) is surfaced as plain text rather
    /// than rejected.
    pub fn parse(raw: &str) -> MessageContent {
        serde_json::from_str(raw).unwrap_or_else(|_| MessageContent::PlainText {
            text: raw.to_string(),
        })
    }

    pub fn as_proposal(&self) -> Option<&ProposalData> {
        match self {
            MessageContent::ExchangeProposal(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub conversation_key: String,
    pub content: MessageContent,
    pub status: MessageStatus,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Raw row shape; `content` is decoded into [`MessageContent`] on the way
/// out of the db layer.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub conversation_key: String,
    pub content: String,
    pub status: MessageStatus,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            conversation_key: row.conversation_key,
            content: MessageContent::parse(&row.content),
            status: row.status,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

/// One entry of the conversation list: the partner, the newest message of
/// the thread, and how many messages the viewer has not read yet.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub partner: UserProfile,
    pub last_message: Message,
    pub unread_count: i64,
}
