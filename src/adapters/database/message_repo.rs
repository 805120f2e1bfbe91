use crate::adapters::database::DbPool;
use crate::adapters::database::records::MessageRecord;
use crate::domain::conversation::ConversationId;
use crate::domain::message::{Message, MessagePage, PageWindow};
use crate::error::{AppError, Result};
use crate::services::message_log::MessageStore;
use async_trait::async_trait;
use sqlx::PgConnection;
use std::collections::HashMap;
use uuid::Uuid;

const COLUMNS: &str = "id, conversation_id, sender_id, content, message_type, created_at";

/// Messages stored one row per message, ordered by the `seq` column.
///
/// Mutations lock the owning conversation row first, which serializes writers
/// per conversation while leaving other conversations untouched.
#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn lock_conversation(conn: &mut PgConnection, conversation_id: ConversationId) -> Result<bool> {
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM conversations WHERE id = $1 FOR UPDATE")
            .bind(conversation_id)
            .fetch_optional(conn)
            .await?;
        Ok(locked.is_some())
    }

    fn into_messages(records: Vec<MessageRecord>) -> Result<Vec<Message>> {
        records.into_iter().map(Message::try_from).collect()
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[tracing::instrument(level = "debug", skip(self, message), fields(message_id = %message.id))]
    async fn append(&self, conversation_id: ConversationId, message: &Message) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_conversation(&mut tx, conversation_id).await? {
            return Err(AppError::NotFound);
        }

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, conversation_id, sender_id, content, message_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn page(&self, conversation_id: ConversationId, page: u32, page_size: u32) -> Result<MessagePage> {
        let mut tx = self.pool.begin().await?;
        // Count and window must come from the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ").execute(&mut *tx).await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(&mut *tx)
            .await?;
        let window = PageWindow::compute(u64::try_from(total).unwrap_or_default(), page, page_size);

        let records = if window.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, MessageRecord>(&format!(
                r#"
                SELECT {COLUMNS}
                FROM chat_messages
                WHERE conversation_id = $1
                ORDER BY seq ASC
                OFFSET $2
                LIMIT $3
                "#
            ))
            .bind(conversation_id)
            .bind(to_i64(window.start))
            .bind(to_i64(window.len()))
            .fetch_all(&mut *tx)
            .await?
        };

        tx.commit().await?;

        Ok(MessagePage { messages: Self::into_messages(records)?, pagination: window.into() })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn all(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {COLUMNS} FROM chat_messages WHERE conversation_id = $1 ORDER BY seq ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Self::into_messages(records)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(count = conversation_ids.len()))]
    async fn latest(&self, conversation_ids: &[ConversationId]) -> Result<HashMap<ConversationId, Message>> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT DISTINCT ON (conversation_id) {COLUMNS}
            FROM chat_messages
            WHERE conversation_id = ANY($1)
            ORDER BY conversation_id, seq DESC
            "#
        ))
        .bind(conversation_ids)
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|record| {
                let conversation_id = record.conversation_id;
                Message::try_from(record).map(|message| (conversation_id, message))
            })
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self, term))]
    async fn search(&self, conversation_id: ConversationId, term: &str) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM chat_messages
            WHERE conversation_id = $1
              AND POSITION(LOWER($2) IN LOWER(content)) > 0
            ORDER BY seq ASC
            "#
        ))
        .bind(conversation_id)
        .bind(term)
        .fetch_all(&self.pool)
        .await?;

        Self::into_messages(records)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove(&self, conversation_id: ConversationId, message_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_conversation(&mut tx, conversation_id).await? {
            return Ok(false);
        }

        let result = sqlx::query("DELETE FROM chat_messages WHERE conversation_id = $1 AND id = $2")
            .bind(conversation_id)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn count(&self, conversation_id: ConversationId) -> Result<u64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(total).unwrap_or_default())
    }
}
