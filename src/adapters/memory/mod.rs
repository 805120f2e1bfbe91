//! Process-local storage backend.
//!
//! Keeps each conversation's message log as a single document guarded by its
//! own async mutex. Used by the test suites and by `--storage memory` runs.

mod conversation_store;
mod directory;
mod message_store;

pub use conversation_store::InMemoryConversationStore;
pub use directory::{DirectorySeed, InMemoryDirectory, SeedCourse, SeedUser};
pub use message_store::InMemoryMessageStore;
