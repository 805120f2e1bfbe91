use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Which backend holds conversations and messages
    #[arg(long, env = "COURSEHUB_STORAGE", value_enum, default_value_t = StorageBackend::Postgres)]
    pub storage: StorageBackend,

    /// JSON file of users, courses and enrollments for the in-memory directory
    #[arg(long, env = "COURSEHUB_SEED_DIRECTORY")]
    pub seed_directory: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub chat: ChatConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "COURSEHUB_DATABASE_URL", default_value = "")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "COURSEHUB_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long, env = "COURSEHUB_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a free connection before failing
    #[arg(long, env = "COURSEHUB_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds an idle connection may live
    #[arg(long, env = "COURSEHUB_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of any connection in seconds
    #[arg(long, env = "COURSEHUB_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "COURSEHUB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "COURSEHUB_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the health endpoints
    #[arg(long, env = "COURSEHUB_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks during shutdown
    #[arg(long, env = "COURSEHUB_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "COURSEHUB_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret shared with the marketplace session layer for JWT verification
    #[arg(long, env = "COURSEHUB_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "COURSEHUB_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "COURSEHUB_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Length of the rolling window for message sends
    #[arg(long, env = "COURSEHUB_SEND_WINDOW_SECS", default_value_t = 60)]
    pub send_window_secs: u64,

    /// Maximum message sends per client inside one window
    #[arg(long, env = "COURSEHUB_SEND_MAX_PER_WINDOW", default_value_t = 30)]
    pub send_max_per_window: usize,

    /// How often idle send-throttle entries are purged
    #[arg(long, env = "COURSEHUB_THROTTLE_GC_INTERVAL_SECS", default_value_t = 120)]
    pub gc_interval_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ChatConfig {
    /// Messages longer than this are truncated before persistence
    #[arg(long, env = "COURSEHUB_MAX_MESSAGE_LENGTH", default_value_t = 1000)]
    pub max_message_length: usize,

    /// Page size used when the client does not ask for one
    #[arg(long, env = "COURSEHUB_DEFAULT_PAGE_SIZE", default_value_t = 50)]
    pub default_page_size: u32,

    /// Upper bound for a client-requested page size
    #[arg(long, env = "COURSEHUB_MAX_PAGE_SIZE", default_value_t = 100)]
    pub max_page_size: u32,

    /// Largest recipient list accepted by a bulk send
    #[arg(long, env = "COURSEHUB_MAX_BULK_RECIPIENTS", default_value_t = 500)]
    pub max_bulk_recipients: usize,

    /// Recipients processed concurrently during a bulk send
    #[arg(long, env = "COURSEHUB_BULK_CONCURRENCY", default_value_t = 8)]
    pub bulk_concurrency: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 1000,
            default_page_size: 50,
            max_page_size: 100,
            max_bulk_recipients: 500,
            bulk_concurrency: 8,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; traces and metrics are only exported when set
    #[arg(long, env = "COURSEHUB_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "COURSEHUB_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
