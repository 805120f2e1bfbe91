//! Client-side polling of conversations.
//!
//! A [`DeliveryClient`] opens one poller per conversation view. The poller
//! fetches the newest page on a fixed interval while the view is visible,
//! reports a new page only when its newest message changes, backs off when
//! throttled and stops for good once access is denied.

mod client;
mod feed;

pub use client::{ConversationView, DeliveryClient, DeliveryConfig, DeliveryEvent, StopReason};
pub use feed::{DEFAULT_REQUEST_TIMEOUT, FeedError, HttpFeed, MessageFeed, ServiceFeed};
