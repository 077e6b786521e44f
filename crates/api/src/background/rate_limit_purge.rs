//! Periodic eviction of idle rate-limit buckets.
//!
//! Buckets are pruned lazily on each request from the same caller; this
//! job drops callers that never come back so the map does not grow
//! without bound.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::middleware::rate_limit::RateLimiter;

/// Run the purge loop every `interval` until `cancel` is triggered.
pub async fn run(limiter: Arc<RateLimiter>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Rate limit purge job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Rate limit purge job stopping");
                break;
            }
            _ = ticker.tick() => {
                let purged = limiter.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Rate limit purge: dropped idle callers");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_on_cancel() {
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_millis(1)));
        limiter.check("a").unwrap();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            Arc::clone(&limiter),
            Duration::from_millis(5),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(limiter.tracked_clients(), 0);
    }
}
