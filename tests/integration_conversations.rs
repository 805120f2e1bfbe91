#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, unreachable_pub)]
use common::{ADMIN, INSTRUCTOR, STUDENT_A, STUDENT_B, STUDENT_C, token_for};
use coursehub_chat::domain::user::Role;
use reqwest::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_start_conversation_is_symmetric() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);
    let bob = token_for(STUDENT_B, Role::Student);

    let from_alice = app.start_conversation(&alice, STUDENT_B).await;
    let from_bob = app.start_conversation(&bob, STUDENT_A).await;
    let again = app.start_conversation(&alice, STUDENT_B).await;

    assert_eq!(from_alice, from_bob);
    assert_eq!(from_alice, again);

    let (status, body) = app.get_json(&alice, "/conversations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["otherUser"]["name"], "Bob");
    assert_eq!(body["data"][0]["participantIds"], json!([1, 2]));
}

#[tokio::test]
async fn test_start_conversation_rejections() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);

    let resp = app
        .client
        .post(app.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "participantId": STUDENT_A }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("yourself"));

    let resp = app
        .client
        .post(app.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "participantId": 4242 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .client
        .post(app.url("/conversations"))
        .bearer_auth(&alice)
        .json(&json!({ "someoneElse": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_by_activity_with_previews() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);

    let with_bob = app.start_conversation(&alice, STUDENT_B).await;
    let with_carol = app.start_conversation(&alice, STUDENT_C).await;
    let with_ivan = app.start_conversation(&alice, INSTRUCTOR).await;

    app.send(&alice, with_carol, "first").await;
    app.send(&alice, with_bob, "second").await;

    let (_, body) = app.get_json(&alice, "/conversations").await;
    let rows = body["data"].as_array().unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();

    assert_eq!(ids, vec![with_bob, with_carol, with_ivan]);
    assert_eq!(rows[0]["lastMessage"]["content"], "second");
    assert_eq!(rows[1]["lastMessage"]["content"], "first");
    assert!(rows[2].get("lastMessage").is_none());

    // Bob only sees his own conversation.
    let (_, body) = app.get_json(&token_for(STUDENT_B, Role::Student), "/conversations").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["otherUser"]["name"], "Alice");
}

#[tokio::test]
async fn test_conversation_details() {
    let app = common::TestApp::spawn().await;
    let alice = token_for(STUDENT_A, Role::Student);
    let id = app.start_conversation(&alice, INSTRUCTOR).await;
    app.send(&alice, id, "hello").await;
    app.send(&alice, id, "are you there?").await;

    let (status, body) = app.get_json(&alice, &format!("/conversations/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["messageCount"], 2);
    assert_eq!(body["data"]["otherUser"]["name"], "Ivan");
    assert_eq!(body["data"]["otherUser"]["email"], "ivan@coursehub.test");
    assert_eq!(body["data"]["otherUser"]["role"], "instructor");

    let (status, body) = app.get_json(&alice, "/conversations/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    // Admins are not participants either.
    let (status, _) = app.get_json(&token_for(ADMIN, Role::Admin), &format!("/conversations/{id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_requires_valid_token() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(app.url("/conversations")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app.client.get(app.url("/conversations")).bearer_auth("not-a-jwt").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let forged = coursehub_chat::domain::auth::Claims::new(STUDENT_A, Role::Admin, 3600).encode("other_secret").unwrap();
    let resp = app.client.get(app.url("/conversations")).bearer_auth(forged).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/conversations"))
        .bearer_auth(token_for(STUDENT_A, Role::Student))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.headers()["x-request-id"], "trace-me-123");

    let resp = app.client.get(app.url("/conversations")).send().await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}
