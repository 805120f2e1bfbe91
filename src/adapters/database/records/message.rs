use crate::domain::message::{Message, MessageType};
use crate::error::AppError;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) conversation_id: i64,
    pub(crate) sender_id: i64,
    pub(crate) content: String,
    pub(crate) message_type: String,
    pub(crate) created_at: OffsetDateTime,
}

impl TryFrom<MessageRecord> for Message {
    type Error = AppError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let message_type = record
            .message_type
            .parse::<MessageType>()
            .map_err(|_| AppError::InternalMsg(format!("stored message has unknown type '{}'", record.message_type)))?;

        Ok(Self {
            id: record.id,
            sender_id: record.sender_id,
            content: record.content,
            message_type,
            created_at: record.created_at,
        })
    }
}
