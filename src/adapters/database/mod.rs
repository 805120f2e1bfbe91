pub mod conversation_repo;
pub mod message_repo;
pub mod records;
pub mod user_repo;

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub use conversation_repo::ConversationRepository;
pub use message_repo::MessageRepository;
pub use user_repo::UserRepository;

pub type DbPool = Pool<Postgres>;

/// Postgres error code for a unique constraint violation.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";
/// Postgres error code for a foreign key violation.
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.url)
        .await
}
