use crate::domain::message::Message;
use crate::domain::user::{OtherUser, UserId, UserProfile};
use crate::error::{AppError, Result};
use time::OffsetDateTime;

pub type ConversationId = i64;

/// An unordered pair of distinct users, stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    /// Normalizes two user ids into a pair.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if both ids are the same user.
    pub fn new(a: UserId, b: UserId) -> Result<Self> {
        if a == b {
            return Err(AppError::BadRequest("Cannot start a conversation with yourself".into()));
        }
        Ok(Self { low: a.min(b), high: a.max(b) })
    }

    /// Rebuilds a pair from already-normalized storage columns.
    pub(crate) const fn from_stored(low: UserId, high: UserId) -> Self {
        Self { low, high }
    }

    #[must_use]
    pub const fn low(&self) -> UserId {
        self.low
    }

    #[must_use]
    pub const fn high(&self) -> UserId {
        self.high
    }

    #[must_use]
    pub const fn contains(&self, user_id: UserId) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The participant that is not `user_id`, or `None` if `user_id` is not in the pair.
    #[must_use]
    pub const fn other(&self, user_id: UserId) -> Option<UserId> {
        if self.low == user_id {
            Some(self.high)
        } else if self.high == user_id {
            Some(self.low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: ParticipantPair,
    pub created_at: OffsetDateTime,
    pub last_activity_at: OffsetDateTime,
}

impl Conversation {
    #[must_use]
    pub const fn has_participant(&self, user_id: UserId) -> bool {
        self.participants.contains(user_id)
    }
}

/// A conversation as seen by one of its participants.
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub other_user: OtherUser,
}

/// A row of the caller's conversation list.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub other_user: OtherUser,
    pub last_message: Option<Message>,
}

/// Conversation detail with the other participant's public profile.
#[derive(Debug, Clone)]
pub struct ConversationDetails {
    pub conversation: Conversation,
    pub other_user: UserProfile,
    pub message_count: u64,
}
