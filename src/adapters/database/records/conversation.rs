use crate::domain::conversation::{Conversation, ParticipantPair};
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct ConversationRecord {
    pub(crate) id: i64,
    pub(crate) participant_low: i64,
    pub(crate) participant_high: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) last_activity_at: OffsetDateTime,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            participants: ParticipantPair::from_stored(record.participant_low, record.participant_high),
            created_at: record.created_at,
            last_activity_at: record.last_activity_at,
        }
    }
}
