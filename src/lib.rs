#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::{ConversationRepository, DbPool, MessageRepository, UserRepository};
use crate::adapters::memory::{DirectorySeed, InMemoryConversationStore, InMemoryDirectory, InMemoryMessageStore};
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::chat_service::ChatService;
use crate::services::conversation_registry::{ConversationRegistry, ConversationStore};
use crate::services::directory::UserDirectory;
use crate::services::health_service::HealthService;
use crate::services::message_log::{MessageLog, MessageStore};
use crate::services::rate_limit_service::{RateLimitService, SendThrottle};
use crate::workers::ThrottleCleanupWorker;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Applies the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
            () = terminate => tracing::info!("Received SIGTERM, shutting down"),
        }

        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();

        tracing::error!(panic.location = %location, panic.payload = %payload, "Thread panicked");
    }));
}

/// The three storage ports the chat core runs on.
#[derive(Clone, Debug)]
pub struct Stores {
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub directory: Arc<dyn UserDirectory>,
}

impl Stores {
    #[must_use]
    pub fn postgres(pool: &DbPool) -> Self {
        Self {
            conversations: Arc::new(ConversationRepository::new(pool.clone())),
            messages: Arc::new(MessageRepository::new(pool.clone())),
            directory: Arc::new(UserRepository::new(pool.clone())),
        }
    }

    #[must_use]
    pub fn in_memory(directory: Arc<InMemoryDirectory>) -> Self {
        Self {
            conversations: Arc::new(InMemoryConversationStore::new()),
            messages: Arc::new(InMemoryMessageStore::new()),
            directory,
        }
    }

    /// In-memory stores with the directory seeded from `config.seed_directory`.
    ///
    /// # Errors
    /// Returns an error if the seed file cannot be read or parsed.
    pub fn in_memory_from_config(config: &Config) -> anyhow::Result<Self> {
        let directory = match &config.seed_directory {
            Some(path) => {
                let directory = InMemoryDirectory::from_seed(load_directory_seed(path)?);
                tracing::info!(path = %path.display(), users = directory.user_count(), "Seeded in-memory directory");
                directory
            }
            None => {
                tracing::warn!("No --seed-directory given; the in-memory directory has no users");
                InMemoryDirectory::new()
            }
        };
        Ok(Self::in_memory(Arc::new(directory)))
    }
}

/// Reads a directory seed file.
///
/// # Errors
/// Returns an error if the file is missing or is not a valid seed document.
pub fn load_directory_seed(path: &Path) -> anyhow::Result<DirectorySeed> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))
}

#[derive(Debug)]
pub struct Workers {
    throttle_cleanup: ThrottleCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.throttle_cleanup.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires stores, services and workers together without touching the network.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    stores: Option<Stores>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, stores: None }
    }

    /// Uses PostgreSQL for every store and for the readiness probe.
    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.stores = Some(Stores::postgres(&pool));
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// # Errors
    /// Returns an error if no storage backend was configured.
    pub fn build(self) -> anyhow::Result<App> {
        let Some(stores) = self.stores else {
            anyhow::bail!("No storage backend configured");
        };

        let registry = ConversationRegistry::new(stores.conversations, Arc::clone(&stores.directory));
        let log = MessageLog::new(stores.messages, self.config.chat.max_message_length);
        let chat_service = ChatService::new(registry, log, stores.directory, self.config.chat.clone());

        let send_throttle = SendThrottle::new(
            Duration::from_secs(self.config.rate_limit.send_window_secs),
            self.config.rate_limit.send_max_per_window,
        );
        let rate_limit_service =
            RateLimitService::new(self.config.server.trusted_proxies.clone(), send_throttle.clone());

        let throttle_cleanup = ThrottleCleanupWorker::new(
            send_throttle,
            Duration::from_secs(self.config.rate_limit.gc_interval_secs.max(1)),
        );

        Ok(App {
            services: ServiceContainer { chat_service, rate_limit_service },
            health_service: HealthService::new(self.pool),
            workers: Workers { throttle_cleanup },
        })
    }
}
