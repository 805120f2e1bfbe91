use crate::domain::conversation::ConversationId;
use crate::domain::message::{Message, MessagePage, PageWindow};
use crate::error::Result;
use crate::services::message_log::MessageStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

type Document = Arc<Mutex<Vec<Message>>>;

/// One oldest-first document per conversation. Every mutation locks the
/// document, rewrites it, and only then releases it.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    documents: DashMap<ConversationId, Document>,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn document(&self, conversation_id: ConversationId) -> Option<Document> {
        self.documents.get(&conversation_id).map(|d| Arc::clone(d.value()))
    }

    fn document_or_create(&self, conversation_id: ConversationId) -> Document {
        Arc::clone(self.documents.entry(conversation_id).or_default().value())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, conversation_id: ConversationId, message: &Message) -> Result<()> {
        let document = self.document_or_create(conversation_id);
        let mut messages = document.lock().await;

        let mut updated = Vec::with_capacity(messages.len() + 1);
        updated.extend(messages.iter().cloned());
        updated.push(message.clone());
        *messages = updated;
        Ok(())
    }

    async fn page(&self, conversation_id: ConversationId, page: u32, page_size: u32) -> Result<MessagePage> {
        let messages = match self.document(conversation_id) {
            Some(document) => document.lock().await.clone(),
            None => Vec::new(),
        };

        let window = PageWindow::compute(messages.len() as u64, page, page_size);
        Ok(MessagePage { messages: window.apply(&messages).to_vec(), pagination: window.into() })
    }

    async fn all(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        match self.document(conversation_id) {
            Some(document) => Ok(document.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn latest(&self, conversation_ids: &[ConversationId]) -> Result<HashMap<ConversationId, Message>> {
        let mut latest = HashMap::new();
        for id in conversation_ids {
            let Some(document) = self.document(*id) else { continue };
            let last = document.lock().await.last().cloned();
            if let Some(last) = last {
                latest.insert(*id, last);
            }
        }
        Ok(latest)
    }

    async fn search(&self, conversation_id: ConversationId, term: &str) -> Result<Vec<Message>> {
        let needle = term.to_lowercase();
        Ok(self
            .all(conversation_id)
            .await?
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .collect())
    }

    async fn remove(&self, conversation_id: ConversationId, message_id: Uuid) -> Result<bool> {
        let Some(document) = self.document(conversation_id) else {
            return Ok(false);
        };
        let mut messages = document.lock().await;

        let before = messages.len();
        let updated: Vec<Message> = messages.iter().filter(|m| m.id != message_id).cloned().collect();
        let removed = updated.len() != before;
        *messages = updated;
        Ok(removed)
    }

    async fn count(&self, conversation_id: ConversationId) -> Result<u64> {
        match self.document(conversation_id) {
            Some(document) => Ok(document.lock().await.len() as u64),
            None => Ok(0),
        }
    }
}
