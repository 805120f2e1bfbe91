use crate::delivery::feed::{FeedError, MessageFeed};
use crate::domain::conversation::ConversationId;
use crate::domain::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub poll_interval: Duration,
    pub max_backoff: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(2000), max_backoff: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// The newest page, emitted on first load and whenever its newest message changes.
    Messages(Vec<Message>),
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Visible,
    Hidden,
    Closed,
}

/// Opens polled views onto conversations.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    feed: Arc<dyn MessageFeed>,
    config: DeliveryConfig,
}

impl DeliveryClient {
    #[must_use]
    pub fn new(feed: Arc<dyn MessageFeed>, config: DeliveryConfig) -> Self {
        Self { feed, config }
    }

    /// Starts polling a conversation. The first poll happens immediately.
    #[must_use]
    pub fn open(&self, conversation_id: ConversationId) -> (ConversationView, mpsc::Receiver<DeliveryEvent>) {
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Visible);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let poller = Poller {
            feed: Arc::clone(&self.feed),
            conversation_id,
            config: self.config,
            visibility: visibility_rx,
            events: events_tx,
        };
        let task = tokio::spawn(poller.run());

        (ConversationView { conversation_id, visibility: visibility_tx, task: Some(task) }, events_rx)
    }
}

/// Handle to one open conversation. Dropping it stops the poller.
#[derive(Debug)]
pub struct ConversationView {
    conversation_id: ConversationId,
    visibility: watch::Sender<Visibility>,
    task: Option<JoinHandle<()>>,
}

impl ConversationView {
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Hiding suspends polling; showing again polls right away.
    pub fn set_visible(&self, visible: bool) {
        let next = if visible { Visibility::Visible } else { Visibility::Hidden };
        self.visibility.send_if_modified(|current| {
            if *current == next || *current == Visibility::Closed {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Stops polling and waits for the poller to exit.
    pub async fn close(mut self) {
        self.visibility.send_replace(Visibility::Closed);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, conversation_id = self.conversation_id, "Poller task ended abnormally");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        self.visibility.send_replace(Visibility::Closed);
    }
}

struct Poller {
    feed: Arc<dyn MessageFeed>,
    conversation_id: ConversationId,
    config: DeliveryConfig,
    visibility: watch::Receiver<Visibility>,
    events: mpsc::Sender<DeliveryEvent>,
}

impl Poller {
    #[tracing::instrument(skip(self), fields(conversation_id = self.conversation_id))]
    async fn run(mut self) {
        // `None` until the first successful poll has been rendered.
        let mut rendered: Option<Option<Uuid>> = None;
        let mut delay = self.config.poll_interval;

        loop {
            let state = *self.visibility.borrow_and_update();
            match state {
                Visibility::Closed => break,
                Visibility::Hidden => {
                    if self.visibility.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                Visibility::Visible => {}
            }

            let polled = tokio::select! {
                polled = self.feed.newest(self.conversation_id) => polled,
                () = closed(&mut self.visibility) => break,
            };

            match polled {
                Ok(messages) => {
                    delay = self.config.poll_interval;
                    let newest = messages.last().map(|m| m.id);
                    if rendered != Some(newest) {
                        rendered = Some(newest);
                        if !self.emit(DeliveryEvent::Messages(messages)).await {
                            break;
                        }
                    }
                }
                Err(FeedError::Throttled) => {
                    delay = delay.saturating_mul(2).min(self.config.max_backoff);
                    tracing::warn!(delay_ms = delay.as_millis(), "Poll throttled, backing off");
                }
                Err(FeedError::Unauthorized) => {
                    tracing::warn!("Lost access to conversation, stopping poller");
                    self.emit(DeliveryEvent::Stopped(StopReason::Unauthorized)).await;
                    break;
                }
                Err(FeedError::Transport(e)) => {
                    tracing::warn!(error = %e, "Poll failed");
                }
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = self.visibility.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Poller stopped");
    }

    /// Waits for room in the event buffer. Returns `false` once the view is
    /// closed or the receiver is gone.
    async fn emit(&mut self, event: DeliveryEvent) -> bool {
        tokio::select! {
            sent = self.events.send(event) => sent.is_ok(),
            () = closed(&mut self.visibility) => false,
        }
    }
}

/// Resolves once the view is closed or its handle is gone.
async fn closed(visibility: &mut watch::Receiver<Visibility>) {
    let _ = visibility.wait_for(|state| *state == Visibility::Closed).await;
}
