use crate::domain::conversation::{Conversation, ConversationDetails, ConversationSummary, ConversationView};
use crate::domain::message::{BulkOutcome, Message, MessagePage, Pagination};
use crate::domain::user::{OtherUser, UserId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Success envelope shared by every `/v1` route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub const fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub sender_id: UserId,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            content: m.content,
            message_type: m.message_type.as_str().to_string(),
            created_at: m.created_at,
        }
    }
}

impl TryFrom<MessageDto> for Message {
    type Error = String;

    fn try_from(dto: MessageDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: dto.id,
            sender_id: dto.sender_id,
            content: dto.content,
            message_type: dto.message_type.parse().map_err(|e: crate::error::AppError| e.to_string())?,
            created_at: dto.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OtherUserDto {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<OtherUser> for OtherUserDto {
    fn from(u: OtherUser) -> Self {
        Self { id: u.id, name: u.name, avatar_url: u.avatar_url }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: i64,
    pub participant_ids: [UserId; 2],
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    pub other_user: OtherUserDto,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_message: Option<MessageDto>,
}

impl ConversationDto {
    fn build(conversation: Conversation, other_user: OtherUser, last_message: Option<Message>) -> Self {
        Self {
            id: conversation.id,
            participant_ids: [conversation.participants.low(), conversation.participants.high()],
            created_at: conversation.created_at,
            last_activity_at: conversation.last_activity_at,
            other_user: other_user.into(),
            last_message: last_message.map(Into::into),
        }
    }
}

impl From<ConversationSummary> for ConversationDto {
    fn from(s: ConversationSummary) -> Self {
        Self::build(s.conversation, s.other_user, s.last_message)
    }
}

impl From<ConversationView> for ConversationDto {
    fn from(v: ConversationView) -> Self {
        Self::build(v.conversation, v.other_user, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfileDto {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetailsDto {
    pub id: i64,
    pub participant_ids: [UserId; 2],
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    pub other_user: ParticipantProfileDto,
    pub message_count: u64,
}

impl From<ConversationDetails> for ConversationDetailsDto {
    fn from(d: ConversationDetails) -> Self {
        let c = d.conversation;
        Self {
            id: c.id,
            participant_ids: [c.participants.low(), c.participants.high()],
            created_at: c.created_at,
            last_activity_at: c.last_activity_at,
            other_user: ParticipantProfileDto {
                id: d.other_user.id,
                name: d.other_user.name,
                email: d.other_user.email,
                avatar_url: d.other_user.avatar_url,
                role: d.other_user.role.as_str().to_string(),
            },
            message_count: d.message_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl From<Pagination> for PaginationDto {
    fn from(p: Pagination) -> Self {
        Self { page: p.page, limit: p.limit, total: p.total, total_pages: p.total_pages, has_more: p.has_more }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePageDto {
    pub messages: Vec<MessageDto>,
    pub pagination: PaginationDto,
}

impl From<MessagePage> for MessagePageDto {
    fn from(p: MessagePage) -> Self {
        Self { messages: p.messages.into_iter().map(Into::into).collect(), pagination: p.pagination.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkResultDto {
    pub recipient_id: UserId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub conversation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl From<BulkOutcome> for BulkResultDto {
    fn from(o: BulkOutcome) -> Self {
        match o.delivered {
            Ok(d) => Self {
                recipient_id: o.recipient_id,
                success: true,
                conversation_id: Some(d.conversation_id),
                message_id: Some(d.message_id),
                error: None,
            },
            Err(e) => Self {
                recipient_id: o.recipient_id,
                success: false,
                conversation_id: None,
                message_id: None,
                error: Some(e),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResultDto {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub participant_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMessageRequest {
    pub recipient_ids: Vec<UserId>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{Delivered, MessageType};

    #[test]
    fn test_message_dto_wire_shape() {
        let message = Message {
            id: Uuid::nil(),
            sender_id: 3,
            content: "hi".into(),
            message_type: MessageType::Emoji,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(MessageDto::from(message.clone())).unwrap();
        assert_eq!(json["senderId"], 3);
        assert_eq!(json["type"], "emoji");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");

        let back: MessageDto = serde_json::from_value(json).unwrap();
        assert_eq!(Message::try_from(back).unwrap(), message);
    }

    #[test]
    fn test_bulk_result_omits_absent_fields() {
        let failed = BulkResultDto::from(BulkOutcome { recipient_id: 9, delivered: Err("Recipient not found".into()) });
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Recipient not found");
        assert!(json.get("messageId").is_none());

        let ok = BulkResultDto::from(BulkOutcome {
            recipient_id: 4,
            delivered: Ok(Delivered { conversation_id: 12, message_id: Uuid::nil() }),
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["conversationId"], 12);
        assert!(json.get("error").is_none());
    }
}
