#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, unreachable_pub)]
use common::{STUDENT_A, STUDENT_B, STUDENT_C, token_for};
use coursehub_chat::delivery::{DeliveryClient, DeliveryConfig, DeliveryEvent, FeedError, HttpFeed, MessageFeed, StopReason};
use coursehub_chat::domain::user::Role;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

mod common;

fn fast_config() -> DeliveryConfig {
    DeliveryConfig { poll_interval: Duration::from_millis(50), max_backoff: Duration::from_millis(400) }
}

async fn next_event(events: &mut mpsc::Receiver<DeliveryEvent>) -> DeliveryEvent {
    timeout(Duration::from_secs(5), events.recv()).await.expect("timed out waiting for event").expect("poller ended")
}

#[tokio::test]
async fn test_http_poller_sees_new_messages() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);
    let bob = token_for(STUDENT_B, Role::Student);
    let id = app.start_conversation(&alice, STUDENT_B).await;
    app.send(&alice, id, "are you coming?").await;

    let feed: Arc<dyn MessageFeed> = Arc::new(HttpFeed::new(app.server_url.clone(), bob.clone(), 50).unwrap());
    let (view, mut events) = DeliveryClient::new(feed, fast_config()).open(id);

    let DeliveryEvent::Messages(initial) = next_event(&mut events).await else { panic!("expected messages") };
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].content, "are you coming?");

    app.send(&alice, id, "hello?").await;
    let DeliveryEvent::Messages(updated) = next_event(&mut events).await else { panic!("expected messages") };
    assert_eq!(updated.last().unwrap().content, "hello?");

    // Nothing new: no further events across several poll intervals.
    assert!(timeout(Duration::from_millis(300), events.recv()).await.is_err());

    view.close().await;
}

#[tokio::test]
async fn test_http_poller_stops_for_outsiders() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);
    let id = app.start_conversation(&alice, STUDENT_B).await;

    let feed: Arc<dyn MessageFeed> =
        Arc::new(HttpFeed::new(app.server_url.clone(), token_for(STUDENT_C, Role::Student), 50).unwrap());
    let (view, mut events) = DeliveryClient::new(feed, fast_config()).open(id);

    assert_eq!(next_event(&mut events).await, DeliveryEvent::Stopped(StopReason::Unauthorized));
    assert!(timeout(Duration::from_secs(1), events.recv()).await.unwrap().is_none());
    assert!(view.is_finished());
}

#[tokio::test]
async fn test_hidden_view_does_not_poll() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);
    let id = app.start_conversation(&alice, STUDENT_B).await;

    let feed: Arc<dyn MessageFeed> =
        Arc::new(HttpFeed::new(app.server_url.clone(), token_for(STUDENT_B, Role::Student), 50).unwrap());
    let (view, mut events) = DeliveryClient::new(feed, fast_config()).open(id);
    assert!(matches!(next_event(&mut events).await, DeliveryEvent::Messages(m) if m.is_empty()));

    view.set_visible(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.send(&alice, id, "while hidden").await;
    assert!(timeout(Duration::from_millis(300), events.recv()).await.is_err());

    view.set_visible(true);
    let DeliveryEvent::Messages(messages) = next_event(&mut events).await else { panic!("expected messages") };
    assert_eq!(messages[0].content, "while hidden");

    view.close().await;
}

#[tokio::test]
async fn test_http_feed_times_out_on_a_silent_server() {
    // Accepts connections and never writes a byte back.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let feed = HttpFeed::with_timeout(
        format!("http://{addr}"),
        token_for(STUDENT_A, Role::Student),
        50,
        Duration::from_millis(200),
    )
    .unwrap();

    let result = timeout(Duration::from_secs(5), feed.newest(1)).await.expect("request was not bounded");
    assert!(matches!(result, Err(FeedError::Transport(_))));
}
