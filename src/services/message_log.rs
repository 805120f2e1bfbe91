use crate::domain::conversation::ConversationId;
use crate::domain::message::{Message, MessagePage, MessageType};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Persistence port for per-conversation message logs.
///
/// Implementations must serialize every mutation of one conversation's log so
/// that concurrent appends never lose a write and readers always observe
/// append order.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Appends a message to the end of the conversation's log in one atomic step.
    async fn append(&self, conversation_id: ConversationId, message: &Message) -> Result<()>;

    /// Returns one backward-numbered page of the log, oldest first within the page.
    async fn page(&self, conversation_id: ConversationId, page: u32, page_size: u32) -> Result<MessagePage>;

    /// The full log, oldest first.
    async fn all(&self, conversation_id: ConversationId) -> Result<Vec<Message>>;

    /// Newest message of each conversation that has one.
    async fn latest(&self, conversation_ids: &[ConversationId]) -> Result<HashMap<ConversationId, Message>>;

    /// Case-insensitive substring match on content, oldest first.
    async fn search(&self, conversation_id: ConversationId, term: &str) -> Result<Vec<Message>>;

    /// Removes a message. Returns `false` if no message had that id.
    async fn remove(&self, conversation_id: ConversationId, message_id: Uuid) -> Result<bool>;

    async fn count(&self, conversation_id: ConversationId) -> Result<u64>;
}

/// Source of message timestamps.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Append-only message storage scoped to conversations. Knows nothing about
/// who may read or write; callers authorize first.
#[derive(Clone, Debug)]
pub struct MessageLog {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    max_content_length: usize,
}

impl MessageLog {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, max_content_length: usize) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), max_content_length)
    }

    #[must_use]
    pub fn with_clock(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>, max_content_length: usize) -> Self {
        Self { store, clock, max_content_length }
    }

    /// Validates and appends a new message.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the content is blank or longer than the limit.
    /// Returns `AppError::ClockSkew` if the clock produced a timestamp in the future.
    /// Returns `AppError::Database` if the store fails; nothing is persisted in that case.
    #[tracing::instrument(level = "debug", err(level = "warn"), skip(self, content))]
    pub async fn append(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: String,
        message_type: MessageType,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("Message content cannot be empty".into()));
        }
        if content.chars().count() > self.max_content_length {
            return Err(AppError::BadRequest(format!(
                "Message content exceeds {} characters",
                self.max_content_length
            )));
        }

        let message =
            Message { id: Uuid::new_v4(), sender_id, content, message_type, created_at: self.clock.now() };

        if message.created_at > OffsetDateTime::now_utc() {
            return Err(AppError::ClockSkew(message.created_at));
        }

        self.store.append(conversation_id, &message).await?;
        Ok(message)
    }

    /// # Errors
    /// Returns `AppError::BadRequest` if `page` or `page_size` is zero.
    pub async fn page(&self, conversation_id: ConversationId, page: u32, page_size: u32) -> Result<MessagePage> {
        if page == 0 {
            return Err(AppError::BadRequest("Page numbers start at 1".into()));
        }
        if page_size == 0 {
            return Err(AppError::BadRequest("Page size must be at least 1".into()));
        }
        self.store.page(conversation_id, page, page_size).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn all(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        self.store.all(conversation_id).await
    }

    /// Last message per conversation, `None` for conversations with an empty log.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn recent_for(
        &self,
        conversation_ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, Option<Message>>> {
        let mut latest = self.store.latest(conversation_ids).await?;
        Ok(conversation_ids.iter().map(|id| (*id, latest.remove(id))).collect())
    }

    /// # Errors
    /// Returns `AppError::BadRequest` if the term is blank.
    pub async fn search(&self, conversation_id: ConversationId, term: &str) -> Result<Vec<Message>> {
        if term.trim().is_empty() {
            return Err(AppError::BadRequest("Search term cannot be empty".into()));
        }
        self.store.search(conversation_id, term).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn remove(&self, conversation_id: ConversationId, message_id: Uuid) -> Result<bool> {
        self.store.remove(conversation_id, message_id).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn count(&self, conversation_id: ConversationId) -> Result<u64> {
        self.store.count(conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMessageStore;
    use time::Duration;

    fn log() -> MessageLog {
        MessageLog::new(Arc::new(InMemoryMessageStore::new()), 1000)
    }

    #[derive(Debug)]
    struct FastClock;

    impl Clock for FastClock {
        fn now(&self) -> OffsetDateTime {
            OffsetDateTime::now_utc() + Duration::hours(1)
        }
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let log = log();
        for i in 0..25 {
            log.append(1, 10, format!("message {i}"), MessageType::Text).await.unwrap();
        }

        let all = log.all(1).await.unwrap();
        let contents: Vec<_> = all.iter().map(|m| m.content.clone()).collect();
        let expected: Vec<_> = (0..25).map(|i| format!("message {i}")).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let log = log();

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move { log.append(7, i % 2, format!("burst {i}"), MessageType::Text).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        assert_eq!(log.count(7).await.unwrap(), 64);
        let mut ids: Vec<_> = log.all(7).await.unwrap().into_iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 64);
    }

    #[tokio::test]
    async fn test_append_validation() {
        let log = log();

        assert!(matches!(log.append(1, 1, "   ".into(), MessageType::Text).await, Err(AppError::BadRequest(_))));
        assert!(matches!(
            log.append(1, 1, "x".repeat(1001), MessageType::Text).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(log.count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_future_timestamp_rejected() {
        let store = Arc::new(InMemoryMessageStore::new());
        let log = MessageLog::with_clock(store, Arc::new(FastClock), 1000);

        let result = log.append(1, 1, "from tomorrow".into(), MessageType::Text).await;
        assert!(matches!(result, Err(AppError::ClockSkew(_))));
        assert_eq!(log.count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_paging_120_messages() {
        let log = log();
        for i in 1..=120 {
            log.append(3, 1, format!("m{i}"), MessageType::Text).await.unwrap();
        }

        let p1 = log.page(3, 1, 50).await.unwrap();
        assert_eq!(p1.messages.len(), 50);
        assert_eq!(p1.messages.first().unwrap().content, "m71");
        assert_eq!(p1.messages.last().unwrap().content, "m120");
        assert_eq!(p1.pagination.total_pages, 3);
        assert!(p1.pagination.has_more);

        let p2 = log.page(3, 2, 50).await.unwrap();
        assert_eq!(p2.messages.first().unwrap().content, "m21");
        assert_eq!(p2.messages.last().unwrap().content, "m70");

        let p3 = log.page(3, 3, 50).await.unwrap();
        assert_eq!(p3.messages.len(), 20);
        assert_eq!(p3.messages.first().unwrap().content, "m1");
        assert_eq!(p3.messages.last().unwrap().content, "m20");
        assert!(!p3.pagination.has_more);

        assert!(log.page(3, 4, 50).await.unwrap().messages.is_empty());
        assert!(matches!(log.page(3, 0, 50).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let log = log();
        let keep = log.append(2, 1, "keep".into(), MessageType::Text).await.unwrap();
        let drop = log.append(2, 1, "drop".into(), MessageType::Emoji).await.unwrap();

        assert!(log.remove(2, drop.id).await.unwrap());
        assert!(!log.remove(2, drop.id).await.unwrap());

        let remaining = log.all(2).await.unwrap();
        assert_eq!(remaining, vec![keep]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_scoped() {
        let log = log();
        log.append(1, 1, "Homework is due Friday".into(), MessageType::Text).await.unwrap();
        log.append(1, 2, "thanks!".into(), MessageType::Text).await.unwrap();
        log.append(2, 1, "homework for the other course".into(), MessageType::Text).await.unwrap();

        let hits = log.search(1, "HOMEWORK").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Homework is due Friday");
        assert!(matches!(log.search(1, "  ").await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_search_keeps_surrounding_whitespace() {
        let log = log();
        log.append(1, 1, "hide the answers".into(), MessageType::Text).await.unwrap();
        log.append(1, 2, "oh hi there".into(), MessageType::Text).await.unwrap();

        let hits = log.search(1, "hi ").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "oh hi there");
    }

    #[tokio::test]
    async fn test_recent_for_maps_empty_logs_to_none() {
        let log = log();
        log.append(1, 1, "first".into(), MessageType::Text).await.unwrap();
        log.append(1, 2, "second".into(), MessageType::Text).await.unwrap();

        let recent = log.recent_for(&[1, 2]).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[&1].as_ref().map(|m| m.content.as_str()), Some("second"));
        assert!(recent[&2].is_none());
    }
}
