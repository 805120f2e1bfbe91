use crate::api::dto::chat::{ApiResponse, MessagePageDto};
use crate::domain::conversation::ConversationId;
use crate::domain::message::Message;
use crate::domain::user::UserId;
use crate::error::AppError;
use crate::services::chat_service::ChatService;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Throttled by the server")]
    Throttled,
    #[error("Not allowed to read this conversation")]
    Unauthorized,
    #[error("Feed request failed: {0}")]
    Transport(String),
}

/// Source of a conversation's newest messages, oldest first.
#[async_trait]
pub trait MessageFeed: Send + Sync + std::fmt::Debug {
    async fn newest(&self, conversation_id: ConversationId) -> Result<Vec<Message>, FeedError>;
}

/// Polls the HTTP API as an authenticated user.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

/// Upper bound on one feed request, connect through body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl HttpFeed {
    /// # Errors
    /// Returns `FeedError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, page_size: u32) -> Result<Self, FeedError> {
        Self::with_timeout(base_url, token, page_size, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`HttpFeed::new`], failing any request that takes longer than `timeout`.
    ///
    /// # Errors
    /// Returns `FeedError::Transport` if the HTTP client cannot be built.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, token, page_size))
    }

    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        page_size: u32,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, token: token.into(), page_size }
    }
}

#[async_trait]
impl MessageFeed for HttpFeed {
    async fn newest(&self, conversation_id: ConversationId) -> Result<Vec<Message>, FeedError> {
        let url =
            format!("{}/v1/conversations/{conversation_id}/messages?page=1&limit={}", self.base_url, self.page_size);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Transport(format!("Feed request timed out: {e}"))
                } else {
                    FeedError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => {
                let body: ApiResponse<MessagePageDto> =
                    response.json().await.map_err(|e| FeedError::Transport(e.to_string()))?;

                body.data
                    .messages
                    .into_iter()
                    .map(Message::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(FeedError::Transport)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(FeedError::Throttled),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FeedError::Unauthorized),
            status => Err(FeedError::Transport(format!("Unexpected status {status}"))),
        }
    }
}

/// Reads straight from an in-process `ChatService`.
#[derive(Debug, Clone)]
pub struct ServiceFeed {
    service: ChatService,
    user_id: UserId,
    page_size: u32,
}

impl ServiceFeed {
    #[must_use]
    pub const fn new(service: ChatService, user_id: UserId, page_size: u32) -> Self {
        Self { service, user_id, page_size }
    }
}

#[async_trait]
impl MessageFeed for ServiceFeed {
    async fn newest(&self, conversation_id: ConversationId) -> Result<Vec<Message>, FeedError> {
        match self.service.get_conversation_messages(conversation_id, self.user_id, Some(1), Some(self.page_size)).await
        {
            Ok(page) => Ok(page.messages),
            Err(AppError::Throttled) => Err(FeedError::Throttled),
            Err(AppError::NotParticipant | AppError::AuthError) => Err(FeedError::Unauthorized),
            Err(e) => Err(FeedError::Transport(e.to_string())),
        }
    }
}
