use crate::domain::conversation::{Conversation, ConversationId, ConversationView, ParticipantPair};
use crate::domain::user::{OtherUser, UserId};
use crate::error::{AppError, Result};
use crate::services::directory::UserDirectory;
use async_trait::async_trait;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::OffsetDateTime;

/// Persistence port for conversation records.
#[async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    async fn find(&self, id: ConversationId) -> Result<Option<Conversation>>;

    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>>;

    /// Inserts a new conversation for the pair.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if a conversation for the pair already exists.
    async fn insert(&self, pair: ParticipantPair) -> Result<Conversation>;

    /// Sets the last-activity timestamp.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    async fn touch(&self, id: ConversationId, at: OffsetDateTime) -> Result<()>;

    /// Conversations the user takes part in, most recently active first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>>;
}

#[derive(Clone, Debug)]
struct Metrics {
    created_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("coursehub-chat");
        Self {
            created_total: meter
                .u64_counter("chat_conversations_created_total")
                .with_description("Conversations created, labelled by whether creation raced another request")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConversationRegistry {
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn UserDirectory>,
    metrics: Metrics,
}

impl ConversationRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { store, directory, metrics: Metrics::new() }
    }

    /// Returns the conversation between two users, creating it on first contact.
    ///
    /// A concurrent creator winning the insert is not an error: the winner's record is returned.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if both users are the same.
    /// Returns `AppError::Database` if the store fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_or_create(&self, user_a: UserId, user_b: UserId) -> Result<Conversation> {
        let pair = ParticipantPair::new(user_a, user_b)?;

        if let Some(existing) = self.store.find_by_pair(pair).await? {
            return Ok(existing);
        }

        match self.store.insert(pair).await {
            Ok(conversation) => {
                tracing::debug!(conversation_id = conversation.id, "Conversation created");
                self.metrics.created_total.add(1, &[KeyValue::new("raced", false)]);
                Ok(conversation)
            }
            Err(AppError::Conflict(_)) => {
                tracing::debug!("Lost conversation creation race, re-reading winner");
                self.metrics.created_total.add(1, &[KeyValue::new("raced", true)]);
                self.store.find_by_pair(pair).await?.ok_or_else(|| {
                    AppError::InternalMsg("conversation vanished after uniqueness conflict".into())
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Looks up the conversation between two users without creating it.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn find_by_users(&self, user_a: UserId, user_b: UserId) -> Result<Option<Conversation>> {
        match ParticipantPair::new(user_a, user_b) {
            Ok(pair) => self.store.find_by_pair(pair).await,
            Err(_) => Ok(None),
        }
    }

    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn find(&self, id: ConversationId) -> Result<Option<Conversation>> {
        self.store.find(id).await
    }

    /// True iff the conversation exists and `user_id` is one of its two participants.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    pub async fn is_participant(&self, id: ConversationId, user_id: UserId) -> Result<bool> {
        Ok(self.store.find(id).await?.is_some_and(|c| c.has_participant(user_id)))
    }

    /// Marks the conversation as active now.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    pub async fn touch(&self, id: ConversationId) -> Result<()> {
        self.store.touch(id, OffsetDateTime::now_utc()).await
    }

    /// Lists the user's conversations with the other participant's name and avatar attached.
    ///
    /// Rows whose other participant no longer has a profile are left out.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the store or directory fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(count = tracing::field::Empty))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ConversationView>> {
        let conversations = self.store.list_for_user(user_id).await?;

        let other_ids: Vec<UserId> =
            conversations.iter().filter_map(|c| c.participants.other(user_id)).collect();
        let profiles = self.directory.profiles(&other_ids).await?;

        let views: Vec<ConversationView> = conversations
            .into_iter()
            .filter_map(|conversation| {
                let other_id = conversation.participants.other(user_id)?;
                let Some(profile) = profiles.get(&other_id) else {
                    tracing::debug!(conversation_id = conversation.id, other_id, "Skipping conversation with unknown user");
                    return None;
                };
                Some(ConversationView { conversation, other_user: OtherUser::from(profile) })
            })
            .collect();

        tracing::Span::current().record("count", views.len());
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryConversationStore, InMemoryDirectory};
    use crate::domain::user::Role;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn directory() -> Arc<InMemoryDirectory> {
        let directory = InMemoryDirectory::new();
        directory.add_user(1, "Ada", Role::Student);
        directory.add_user(2, "Grace", Role::Instructor);
        directory.add_user(3, "Linus", Role::Student);
        Arc::new(directory)
    }

    fn registry() -> ConversationRegistry {
        ConversationRegistry::new(Arc::new(InMemoryConversationStore::new()), directory())
    }

    #[tokio::test]
    async fn test_get_or_create_is_symmetric() {
        let registry = registry();

        let ab = registry.get_or_create(1, 2).await.unwrap();
        let ba = registry.get_or_create(2, 1).await.unwrap();

        assert_eq!(ab.id, ba.id);
        assert_eq!(ab.participants.low(), 1);
        assert_eq!(ab.participants.high(), 2);
    }

    #[tokio::test]
    async fn test_get_or_create_rejects_self() {
        let registry = registry();
        assert!(matches!(registry.get_or_create(3, 3).await, Err(AppError::BadRequest(_))));
        assert!(registry.find_by_users(3, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creators_share_one_record() {
        let registry = registry();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 { registry.get_or_create(1, 3).await } else { registry.get_or_create(3, 1).await }
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in futures::future::join_all(tasks).await {
            ids.push(task.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    /// Pretends the pair is missing on the first lookup, as if another request
    /// inserted it between our read and our write.
    #[derive(Debug)]
    struct RacingStore {
        inner: InMemoryConversationStore,
        hide_once: AtomicBool,
    }

    #[async_trait]
    impl ConversationStore for RacingStore {
        async fn find(&self, id: ConversationId) -> Result<Option<Conversation>> {
            self.inner.find(id).await
        }

        async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>> {
            if self.hide_once.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_pair(pair).await
        }

        async fn insert(&self, pair: ParticipantPair) -> Result<Conversation> {
            self.inner.insert(pair).await
        }

        async fn touch(&self, id: ConversationId, at: OffsetDateTime) -> Result<()> {
            self.inner.touch(id, at).await
        }

        async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>> {
            self.inner.list_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_conflict_on_insert_returns_existing() {
        let inner = InMemoryConversationStore::new();
        let existing = inner.insert(ParticipantPair::new(1, 2).unwrap()).await.unwrap();
        let store = Arc::new(RacingStore { inner, hide_once: AtomicBool::new(true) });
        let registry = ConversationRegistry::new(store, directory());

        let resolved = registry.get_or_create(2, 1).await.unwrap();
        assert_eq!(resolved.id, existing.id);
    }

    #[tokio::test]
    async fn test_is_participant() {
        let registry = registry();
        let conversation = registry.get_or_create(1, 2).await.unwrap();

        assert!(registry.is_participant(conversation.id, 1).await.unwrap());
        assert!(registry.is_participant(conversation.id, 2).await.unwrap());
        assert!(!registry.is_participant(conversation.id, 3).await.unwrap());
        assert!(!registry.is_participant(9999, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_orders_by_activity_and_resolves_other_user() {
        let registry = registry();
        let with_grace = registry.get_or_create(1, 2).await.unwrap();
        let with_linus = registry.get_or_create(3, 1).await.unwrap();

        registry.touch(with_grace.id).await.unwrap();

        let views = registry.list_for_user(1).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].conversation.id, with_grace.id);
        assert_eq!(views[0].other_user.name, "Grace");
        assert_eq!(views[1].conversation.id, with_linus.id);
        assert_eq!(views[1].other_user.id, 3);

        let from_linus = registry.list_for_user(3).await.unwrap();
        assert_eq!(from_linus.len(), 1);
        assert_eq!(from_linus[0].other_user.name, "Ada");
    }

    #[tokio::test]
    async fn test_touch_unknown_conversation() {
        assert!(matches!(registry().touch(404).await, Err(AppError::NotFound)));
    }
}
