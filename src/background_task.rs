use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::limiter::rate_limiter::RateLimitStore;

pub const PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

pub async fn start_purge_task(store: Arc<dyn RateLimitStore>, every: Duration) {
    let mut interval = interval(every);

    loop {
        interval.tick().await;

        match store.purge_expired(Utc::now().timestamp()).await {
            Ok(0) => tracing::debug!(store = store.kind(), "No expired rate limit records"),
            Ok(count) => tracing::info!(store = store.kind(), "Purged {} expired rate limit records", count),
            Err(e) => tracing::error!(store = store.kind(), "Purge failed: {}", e),
        }
    }
}
