use crate::services::rate_limit_service::SendThrottle;
use opentelemetry::{global, metrics::Counter};
use std::time::Duration;

#[derive(Clone, Debug)]
struct Metrics {
    purged: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("coursehub-chat");
        Self {
            purged: meter
                .u64_counter("send_throttle_purged_clients_total")
                .with_description("Idle clients dropped from the send throttle")
                .build(),
        }
    }
}

/// Periodically drops send-throttle entries for clients that have gone quiet.
#[derive(Debug)]
pub struct ThrottleCleanupWorker {
    throttle: SendThrottle,
    interval: Duration,
    metrics: Metrics,
}

impl ThrottleCleanupWorker {
    #[must_use]
    pub fn new(throttle: SendThrottle, interval: Duration) -> Self {
        Self { throttle, interval, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    self.perform_cleanup();
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Throttle cleanup loop shutting down...");
    }

    #[tracing::instrument(skip(self), fields(purged = tracing::field::Empty))]
    pub fn perform_cleanup(&self) -> usize {
        let purged = self.throttle.purge_idle();
        if purged > 0 {
            tracing::debug!(count = purged, remaining = self.throttle.tracked_clients(), "Purged idle throttle entries");
            self.metrics.purged.add(purged as u64, &[]);
            tracing::Span::current().record("purged", purged);
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use tokio::sync::watch;

    #[tokio::test(start_paused = true)]
    async fn test_worker_purges_and_stops_on_shutdown() {
        let throttle = SendThrottle::new(Duration::from_secs(5), 10);
        let client: IpAddr = "192.0.2.44".parse().unwrap();
        throttle.check(client).unwrap();

        let (tx, rx) = watch::channel(false);
        let worker = ThrottleCleanupWorker::new(throttle.clone(), Duration::from_secs(10));
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(throttle.tracked_clients(), 0);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
