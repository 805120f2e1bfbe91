use crate::domain::user::UserId;
use crate::error::AppError;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Text,
    Emoji,
}

impl MessageType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Emoji => "emoji",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "emoji" => Ok(Self::Emoji),
            other => Err(AppError::BadRequest(format!("Invalid message type '{other}', expected 'text' or 'emoji'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: OffsetDateTime,
}

/// The slice of a conversation's log covered by one page.
///
/// Pages count backwards from the newest message: page 1 is the newest
/// `page_size` messages, page 2 the ones immediately older, and so on. Within a
/// page messages stay oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    /// Inclusive start offset into the oldest-first sequence.
    pub start: u64,
    /// Exclusive end offset into the oldest-first sequence.
    pub end: u64,
}

impl PageWindow {
    #[must_use]
    pub fn compute(total: u64, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let size = u64::from(page_size);

        let end = total.saturating_sub(u64::from(page - 1).saturating_mul(size));
        let start = total.saturating_sub(u64::from(page).saturating_mul(size));

        Self { page, page_size, total, start, end }
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page_size as u64)
    }

    /// Slices an in-memory oldest-first log.
    #[must_use]
    pub fn apply<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.start).unwrap_or(usize::MAX).min(items.len());
        let end = usize::try_from(self.end).unwrap_or(usize::MAX).min(items.len());
        &items[start..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl From<PageWindow> for Pagination {
    fn from(window: PageWindow) -> Self {
        let total_pages = window.total_pages();
        Self {
            page: window.page,
            limit: window.page_size,
            total: window.total,
            total_pages,
            has_more: u64::from(window.page) < total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

/// Result of delivering one recipient's copy of a bulk message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub recipient_id: UserId,
    pub delivered: Result<Delivered, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub conversation_id: i64,
    pub message_id: Uuid,
}

impl BulkOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.delivered.is_ok()
    }
}
