#![allow(dead_code)]
use clap::Parser;
use coursehub_chat::adapters::memory::InMemoryDirectory;
use coursehub_chat::api::{MgmtState, app_router, mgmt_router};
use coursehub_chat::config::Config;
use coursehub_chat::domain::auth::Claims;
use coursehub_chat::domain::user::{Role, UserId};
use coursehub_chat::{AppBuilder, Stores};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use tokio::net::TcpListener;

static INIT: Once = Once::new();

pub const JWT_SECRET: &str = "test_secret";

pub const STUDENT_A: UserId = 1;
pub const STUDENT_B: UserId = 2;
pub const STUDENT_C: UserId = 3;
pub const INSTRUCTOR: UserId = 10;
pub const ADMIN: UserId = 99;
pub const COURSE: i64 = 7;

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("coursehub_chat=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::parse_from(["coursehub-chat", "--storage", "memory", "--jwt-secret", JWT_SECRET]);
    config.server.host = "127.0.0.1".to_string();
    config.server.trusted_proxies = vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()];
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config.rate_limit.send_max_per_window = 10_000;
    config
}

/// Users 1-3 are students, 10 teaches course 7 (students 1-3 enrolled), 99 is an admin.
pub fn seeded_directory() -> Arc<InMemoryDirectory> {
    let directory = Arc::new(InMemoryDirectory::new());
    directory.add_user(STUDENT_A, "Alice", Role::Student);
    directory.add_user(STUDENT_B, "Bob", Role::Student);
    directory.add_user(STUDENT_C, "Carol", Role::Student);
    directory.add_user(INSTRUCTOR, "Ivan", Role::Instructor);
    directory.add_user(ADMIN, "Root", Role::Admin);

    directory.add_course(COURSE, INSTRUCTOR);
    for student in [STUDENT_A, STUDENT_B, STUDENT_C] {
        directory.enroll(COURSE, student);
    }
    directory
}

pub fn token_for(user_id: UserId, role: Role) -> String {
    Claims::new(user_id, role, 3600).encode(JWT_SECRET).unwrap()
}

#[derive(Debug)]
pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub stores: Stores,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_with_stores(config, Stores::in_memory(seeded_directory())).await
    }

    pub async fn spawn_with_stores(config: Config, stores: Stores) -> Self {
        setup_tracing();

        let app = AppBuilder::new(config.clone()).with_stores(stores.clone()).build().unwrap();
        let router = app_router(config.clone(), app.services);
        let mgmt = mgmt_router(MgmtState { health_service: app.health_service });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self { server_url, mgmt_url, client: reqwest::Client::new(), config, stores }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.server_url, path)
    }

    /// Opens the conversation between `user` and `other` and returns its id.
    pub async fn start_conversation(&self, token: &str, other: UserId) -> i64 {
        let resp = self
            .client
            .post(self.url("/conversations"))
            .bearer_auth(token)
            .json(&json!({ "participantId": other }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn send(&self, token: &str, conversation_id: i64, content: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/conversations/{conversation_id}/messages")))
            .bearer_auth(token)
            .json(&json!({ "content": content, "type": "text" }))
            .send()
            .await
            .unwrap()
    }

    pub async fn get_json(&self, token: &str, path: &str) -> (reqwest::StatusCode, Value) {
        let resp = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}
