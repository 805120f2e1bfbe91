use crate::adapters::database::records::ConversationRecord;
use crate::adapters::database::{DbPool, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};
use crate::domain::conversation::{Conversation, ConversationId, ParticipantPair};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use crate::services::conversation_registry::ConversationStore;
use async_trait::async_trait;
use time::OffsetDateTime;

const COLUMNS: &str = "id, participant_low, participant_high, created_at, last_activity_at";

#[derive(Clone, Debug)]
pub struct ConversationRepository {
    pool: DbPool,
}

impl ConversationRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: ConversationId) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!("SELECT {COLUMNS} FROM conversations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {COLUMNS} FROM conversations WHERE participant_low = $1 AND participant_high = $2"
        ))
        .bind(pair.low())
        .bind(pair.high())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn insert(&self, pair: ParticipantPair) -> Result<Conversation> {
        let result = sqlx::query_as::<_, ConversationRecord>(&format!(
            r#"
            INSERT INTO conversations (participant_low, participant_high)
            VALUES ($1, $2)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AppError::Conflict("conversation already exists".into()))
            }
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                // One of the participants is not a known user
                Err(AppError::NotFound)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn touch(&self, id: ConversationId, at: OffsetDateTime) -> Result<()> {
        let result = sqlx::query("UPDATE conversations SET last_activity_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM conversations
            WHERE participant_low = $1 OR participant_high = $1
            ORDER BY last_activity_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
