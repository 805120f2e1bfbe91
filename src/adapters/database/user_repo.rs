use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::user::{UserId, UserProfile};
use crate::error::Result;
use crate::services::directory::UserDirectory;
use async_trait::async_trait;
use std::collections::HashMap;

/// Reads the marketplace's user, course and enrollment tables.
#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, avatar_url, role FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self), fields(count = user_ids.len()))]
    async fn profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, avatar_url, role FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(|r| (r.id, UserProfile::from(r))).collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn course_instructor(&self, course_id: i64) -> Result<Option<UserId>> {
        let instructor = sqlx::query_scalar::<_, i64>("SELECT instructor_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(instructor)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn course_participants(&self, course_id: i64) -> Result<Vec<UserId>> {
        let participants = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM enrollments WHERE course_id = $1 ORDER BY enrolled_at ASC, user_id ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }
}
