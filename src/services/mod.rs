pub mod chat_service;
pub mod conversation_registry;
pub mod directory;
pub mod health_service;
pub mod message_log;
pub mod rate_limit_service;
