use crate::domain::conversation::{Conversation, ConversationId, ParticipantPair};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use crate::services::conversation_registry::ConversationStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicI64, Ordering};
use time::OffsetDateTime;

#[derive(Debug)]
pub struct InMemoryConversationStore {
    by_id: DashMap<ConversationId, Conversation>,
    by_pair: DashMap<ParticipantPair, ConversationId>,
    next_id: AtomicI64,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self { by_id: DashMap::new(), by_pair: DashMap::new(), next_id: AtomicI64::new(1) }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find(&self, id: ConversationId) -> Result<Option<Conversation>> {
        Ok(self.by_id.get(&id).map(|c| c.value().clone()))
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>> {
        let Some(id) = self.by_pair.get(&pair).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.find(id).await
    }

    async fn insert(&self, pair: ParticipantPair) -> Result<Conversation> {
        // The pair entry stays locked until the record is visible by id.
        match self.by_pair.entry(pair) {
            Entry::Occupied(_) => Err(AppError::Conflict("conversation already exists".into())),
            Entry::Vacant(slot) => {
                let now = OffsetDateTime::now_utc();
                let conversation = Conversation {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    participants: pair,
                    created_at: now,
                    last_activity_at: now,
                };
                self.by_id.insert(conversation.id, conversation.clone());
                slot.insert(conversation.id);
                Ok(conversation)
            }
        }
    }

    async fn touch(&self, id: ConversationId, at: OffsetDateTime) -> Result<()> {
        let mut conversation = self.by_id.get_mut(&id).ok_or(AppError::NotFound)?;
        conversation.last_activity_at = at;
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = self
            .by_id
            .iter()
            .filter(|c| c.value().has_participant(user_id))
            .map(|c| c.value().clone())
            .collect();
        conversations.sort_by_key(|c| (Reverse(c.last_activity_at), Reverse(c.id)));
        Ok(conversations)
    }
}
