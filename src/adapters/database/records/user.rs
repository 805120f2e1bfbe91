use crate::domain::user::{Role, UserProfile};

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) avatar_url: Option<String>,
    pub(crate) role: String,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        let role = record.role.parse().unwrap_or_else(|e| {
            tracing::warn!(user_id = record.id, error = %e, "Unrecognized role, treating as student");
            Role::Student
        });

        Self { id: record.id, name: record.name, email: record.email, avatar_url: record.avatar_url, role }
    }
}
