use crate::domain::user::{UserId, UserProfile};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Read-only view of the marketplace's user, course and enrollment records.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    async fn profile(&self, user_id: UserId) -> Result<Option<UserProfile>>;

    /// Looks up many profiles at once. Unknown ids are absent from the map.
    async fn profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>>;

    /// The instructor who owns a course, or `None` if the course does not exist.
    async fn course_instructor(&self, course_id: i64) -> Result<Option<UserId>>;

    /// Users enrolled in a course.
    async fn course_participants(&self, course_id: i64) -> Result<Vec<UserId>>;
}
