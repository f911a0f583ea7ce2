pub mod messages;
pub mod users;

pub use messages::{
    ConversationSummary, Message, MessageContent, MessageRow, MessageStatus, NoticeData,
    ProposalData, SkillSnapshot,
};
pub use users::{Skill, SkillKind, SkillLevel, SkillListing, User, UserProfile};
