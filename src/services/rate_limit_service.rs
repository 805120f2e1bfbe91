use crate::error::{AppError, Result};
use axum::http::Request;
use axum::http::StatusCode;
use dashmap::DashMap;
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub decisions_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("coursehub-chat");
        Self {
            decisions_total: meter
                .u64_counter("rate_limit_decisions_total")
                .with_description("Rate limit decisions (allowed/throttled)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct IpKeyExtractor {
    trusted_proxies: Vec<IpNetwork>,
}

impl IpKeyExtractor {
    #[must_use]
    pub const fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        Self { trusted_proxies }
    }

    /// Resolves the client address, only believing `X-Forwarded-For` when the
    /// peer is a trusted proxy. The chain is walked right to left and the first
    /// untrusted hop wins.
    #[must_use]
    pub fn identify_client_ip(&self, headers: &axum::http::HeaderMap, peer_addr: IpAddr) -> IpAddr {
        if !self.is_trusted(&peer_addr) {
            return peer_addr;
        }

        let xff = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());

        if let Some(xff_val) = xff
            && let Some(real_ip) =
                xff_val.rsplit(',').filter_map(|s| s.trim().parse::<IpAddr>().ok()).find(|ip| !self.is_trusted(ip))
        {
            return real_ip;
        }

        peer_addr
    }

    fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(*ip))
    }
}

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> std::result::Result<Self::Key, GovernorError> {
        use axum::extract::ConnectInfo;
        use std::net::SocketAddr;

        let peer_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)?;

        Ok(self.identify_client_ip(req.headers(), peer_ip))
    }
}

/// Rolling-window limiter for message sends.
///
/// Each client keeps the instants of its accepted sends inside the window.
/// Rejected attempts are not recorded, so a throttled client recovers as soon
/// as its oldest accepted send ages out.
#[derive(Clone, Debug)]
pub struct SendThrottle {
    window: Duration,
    max_per_window: usize,
    hits: Arc<DashMap<IpAddr, VecDeque<Instant>>>,
}

impl SendThrottle {
    #[must_use]
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        Self { window, max_per_window, hits: Arc::new(DashMap::new()) }
    }

    /// Records a send for `client` if it is still under its allowance.
    ///
    /// # Errors
    /// Returns `AppError::Throttled` if the client has used up the window.
    pub fn check(&self, client: IpAddr) -> Result<()> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Result<()> {
        let mut hits = self.hits.entry(client).or_default();

        while hits.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
            hits.pop_front();
        }

        if hits.len() >= self.max_per_window {
            return Err(AppError::Throttled);
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drops clients with no sends inside the window. Returns how many were dropped.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.hits.len();
        self.hits.retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < self.window));
        before.saturating_sub(self.hits.len())
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitService {
    pub extractor: IpKeyExtractor,
    pub send_throttle: SendThrottle,
    pub metrics: Metrics,
}

impl RateLimitService {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>, send_throttle: SendThrottle) -> Self {
        Self { extractor: IpKeyExtractor::new(trusted_proxies), send_throttle, metrics: Metrics::new() }
    }

    pub fn log_decision(&self, status: StatusCode, ratelimit_after: Option<String>) {
        let label = if status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(after) = ratelimit_after {
                warn!("Rate limit exceeded (retry allowed after {}s)", after);
            } else {
                warn!("Send limit exceeded");
            }
            "throttled"
        } else {
            "allowed"
        };

        self.metrics.decisions_total.add(1, &[KeyValue::new("status", label)]);
    }
}
