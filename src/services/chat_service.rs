use crate::config::ChatConfig;
use crate::domain::conversation::{ConversationDetails, ConversationId, ConversationSummary, ConversationView, ParticipantPair};
use crate::domain::message::{BulkOutcome, Delivered, Message, MessagePage, MessageType};
use crate::domain::user::{OtherUser, Role, UserId};
use crate::error::{AppError, Result};
use crate::services::conversation_registry::ConversationRegistry;
use crate::services::directory::UserDirectory;
use crate::services::message_log::MessageLog;
use futures::{StreamExt, stream};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    bulk_deliveries_total: Counter<u64>,
    page_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("coursehub-chat");
        Self {
            sent_total: meter
                .u64_counter("chat_messages_sent_total")
                .with_description("Messages sent, by outcome")
                .build(),
            bulk_deliveries_total: meter
                .u64_counter("chat_bulk_deliveries_total")
                .with_description("Per-recipient outcomes of bulk sends")
                .build(),
            page_size: meter
                .u64_histogram("chat_message_page_size")
                .with_description("Number of messages returned in a single page")
                .build(),
        }
    }
}

/// Entry point for every conversation-scoped operation. Participation is
/// checked here, before the message log is read or written.
#[derive(Clone, Debug)]
pub struct ChatService {
    registry: ConversationRegistry,
    log: MessageLog,
    directory: Arc<dyn UserDirectory>,
    config: ChatConfig,
    metrics: Metrics,
}

impl ChatService {
    #[must_use]
    pub fn new(
        registry: ConversationRegistry,
        log: MessageLog,
        directory: Arc<dyn UserDirectory>,
        config: ChatConfig,
    ) -> Self {
        Self { registry, log, directory, config, metrics: Metrics::new() }
    }

    async fn authorize(&self, conversation_id: ConversationId, user_id: UserId) -> Result<()> {
        if self.registry.is_participant(conversation_id, user_id).await? {
            Ok(())
        } else {
            tracing::debug!(conversation_id, user_id, "Rejected non-participant");
            Err(AppError::NotParticipant)
        }
    }

    /// Trims the content and cuts it down to the configured length.
    fn prepare_content(&self, content: &str) -> Result<String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(AppError::BadRequest("Message content cannot be empty".into()));
        }
        Ok(trimmed.chars().take(self.config.max_message_length).collect())
    }

    /// Parses a client-supplied message type, defaulting to text.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for anything other than `text` or `emoji`.
    pub fn parse_message_type(raw: Option<&str>) -> Result<MessageType> {
        raw.map_or(Ok(MessageType::Text), str::parse)
    }

    /// Opens (or reopens) the conversation between the caller and another user.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the caller targets themselves.
    /// Returns `AppError::NotFound` if the other user does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn start_conversation(&self, caller_id: UserId, other_id: UserId) -> Result<ConversationView> {
        ParticipantPair::new(caller_id, other_id)?;

        let profile = self.directory.profile(other_id).await?.ok_or(AppError::NotFound)?;
        let conversation = self.registry.get_or_create(caller_id, other_id).await?;

        Ok(ConversationView { conversation, other_user: OtherUser::from(&profile) })
    }

    /// Sends a message into a conversation the sender takes part in.
    ///
    /// # Errors
    /// Returns `AppError::NotParticipant` if the sender is not in the conversation.
    /// Returns `AppError::BadRequest` if the content is blank.
    #[tracing::instrument(err(level = "warn"), skip(self, content))]
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        message_type: MessageType,
    ) -> Result<Message> {
        self.authorize(conversation_id, sender_id).await?;
        let content = self.prepare_content(content)?;

        match self.log.append(conversation_id, sender_id, content, message_type).await {
            Ok(message) => {
                // The message is stored at this point; a failed touch only leaves activity stale.
                if let Err(e) = self.registry.touch(conversation_id).await {
                    tracing::warn!(error = %e, message_id = %message.id, "Failed to update conversation activity");
                }
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                tracing::debug!(message_id = %message.id, "Message appended");
                Ok(message)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Returns one page of messages, page 1 being the newest.
    ///
    /// # Errors
    /// Returns `AppError::NotParticipant` if the user is not in the conversation.
    /// Returns `AppError::BadRequest` if `page` is zero.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<MessagePage> {
        self.authorize(conversation_id, user_id).await?;

        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(self.config.default_page_size).clamp(1, self.config.max_page_size.max(1));

        let result = self.log.page(conversation_id, page, limit).await?;
        self.metrics.page_size.record(result.messages.len() as u64, &[]);
        Ok(result)
    }

    /// Returns the whole log, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::NotParticipant` if the user is not in the conversation.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_all_messages(&self, conversation_id: ConversationId, user_id: UserId) -> Result<Vec<Message>> {
        self.authorize(conversation_id, user_id).await?;
        self.log.all(conversation_id).await
    }

    /// Lists the user's conversations, most recently active first, each with
    /// its other participant and latest message.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the store fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_user_conversations(&self, user_id: UserId) -> Result<Vec<ConversationSummary>> {
        let views = self.registry.list_for_user(user_id).await?;
        let ids: Vec<ConversationId> = views.iter().map(|v| v.conversation.id).collect();
        let mut recent = self.log.recent_for(&ids).await?;

        Ok(views
            .into_iter()
            .map(|view| ConversationSummary {
                last_message: recent.remove(&view.conversation.id).flatten(),
                conversation: view.conversation,
                other_user: view.other_user,
            })
            .collect())
    }

    /// Returns the conversation with the other participant's public profile.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::NotParticipant` if the user is not in the conversation.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversation_details(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<ConversationDetails> {
        let conversation = self.registry.find(conversation_id).await?.ok_or(AppError::NotFound)?;
        let other_id = conversation.participants.other(user_id).ok_or(AppError::NotParticipant)?;

        let other_user = self.directory.profile(other_id).await?.ok_or(AppError::NotFound)?;
        let message_count = self.log.count(conversation_id).await?;

        Ok(ConversationDetails { conversation, other_user, message_count })
    }

    /// # Errors
    /// Returns `AppError::NotParticipant` if the user is not in the conversation.
    /// Returns `AppError::BadRequest` if the term is blank.
    #[tracing::instrument(err(level = "warn"), skip(self, term))]
    pub async fn search_messages(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        term: &str,
    ) -> Result<Vec<Message>> {
        self.authorize(conversation_id, user_id).await?;
        self.log.search(conversation_id, term).await
    }

    /// Deletes a message. Either participant may delete any message.
    /// Returns `false` if the message was already gone.
    ///
    /// # Errors
    /// Returns `AppError::NotParticipant` if the user is not in the conversation.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_message(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        message_id: Uuid,
    ) -> Result<bool> {
        self.authorize(conversation_id, user_id).await?;
        let removed = self.log.remove(conversation_id, message_id).await?;
        if !removed {
            tracing::debug!(%message_id, "Delete of unknown message ignored");
        }
        Ok(removed)
    }

    /// Sends the same message to many users, each through their own conversation.
    ///
    /// One recipient failing never affects the others; every recipient gets an
    /// outcome, in input order.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if the sender's role may not broadcast.
    /// Returns `AppError::BadRequest` if the recipient list is empty or too large, or the content is blank.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, recipient_ids, content),
        fields(recipients = recipient_ids.len(), failures = tracing::field::Empty)
    )]
    pub async fn send_bulk_message(
        &self,
        sender_id: UserId,
        sender_role: Role,
        recipient_ids: Vec<UserId>,
        content: &str,
        message_type: MessageType,
    ) -> Result<Vec<BulkOutcome>> {
        if !sender_role.can_broadcast() {
            return Err(AppError::Forbidden("Only instructors can send bulk messages".into()));
        }
        if recipient_ids.is_empty() {
            return Err(AppError::BadRequest("At least one recipient is required".into()));
        }
        if recipient_ids.len() > self.config.max_bulk_recipients {
            return Err(AppError::BadRequest(format!(
                "Bulk messages are limited to {} recipients",
                self.config.max_bulk_recipients
            )));
        }
        let content = self.prepare_content(content)?;
        let known = self.directory.profiles(&recipient_ids).await?;

        let outcomes: Vec<BulkOutcome> = stream::iter(recipient_ids)
            .map(|recipient_id| {
                let content = content.as_str();
                let exists = recipient_id == sender_id || known.contains_key(&recipient_id);
                async move {
                    let delivered = async {
                        if !exists {
                            return Err(AppError::NotFound);
                        }
                        self.deliver_one(sender_id, recipient_id, content, message_type).await
                    }
                    .await
                        .map_err(|e| {
                            tracing::warn!(recipient_id, error = %e, "Bulk delivery failed for recipient");
                            public_message(&e)
                        });
                    BulkOutcome { recipient_id, delivered }
                }
            })
            .buffered(self.config.bulk_concurrency.max(1))
            .collect()
            .await;

        let failures = outcomes.iter().filter(|o| !o.is_success()).count();
        self.metrics.bulk_deliveries_total.add((outcomes.len() - failures) as u64, &[KeyValue::new("status", "success")]);
        self.metrics.bulk_deliveries_total.add(failures as u64, &[KeyValue::new("status", "failure")]);
        tracing::Span::current().record("failures", failures);

        Ok(outcomes)
    }

    async fn deliver_one(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        content: &str,
        message_type: MessageType,
    ) -> Result<Delivered> {
        let conversation = self.registry.get_or_create(sender_id, recipient_id).await?;
        let message = self.send_message(conversation.id, sender_id, content, message_type).await?;
        Ok(Delivered { conversation_id: conversation.id, message_id: message.id })
    }

    /// Messages every user enrolled in a course.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the course does not exist.
    /// Returns `AppError::Forbidden` unless the sender teaches the course or is an admin.
    /// Returns `AppError::BadRequest` if nobody else is enrolled.
    #[tracing::instrument(err(level = "warn"), skip(self, content))]
    pub async fn send_course_message(
        &self,
        sender_id: UserId,
        sender_role: Role,
        course_id: i64,
        content: &str,
        message_type: MessageType,
    ) -> Result<Vec<BulkOutcome>> {
        let instructor_id = self.directory.course_instructor(course_id).await?.ok_or(AppError::NotFound)?;
        if instructor_id != sender_id && sender_role != Role::Admin {
            return Err(AppError::Forbidden("Only the course instructor can message its students".into()));
        }

        let recipients: Vec<UserId> =
            self.directory.course_participants(course_id).await?.into_iter().filter(|id| *id != sender_id).collect();

        self.send_bulk_message(sender_id, sender_role, recipients, content, message_type).await
    }
}

/// What a caller may see about a failure inside a batch.
fn public_message(error: &AppError) -> String {
    match error {
        AppError::Database(_) | AppError::Internal | AppError::InternalMsg(_) | AppError::ClockSkew(_) => {
            "Internal server error".to_string()
        }
        AppError::NotFound => "Recipient not found".to_string(),
        other => other.to_string(),
    }
}
