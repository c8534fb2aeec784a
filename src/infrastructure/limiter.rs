pub mod file_store;
pub mod rate_limiter;

use std::{io, sync::Arc};

use crate::settings::{AppConfig, RateStoreKind};
use file_store::FileRateStore;
use rate_limiter::{MemoryRateStore, RateLimitStore, RatePolicy};

pub fn store_from_config(config: &AppConfig) -> io::Result<Arc<dyn RateLimitStore>> {
    let policy = RatePolicy::new(config.rate_limit, config.rate_limit_window_secs);

    let store: Arc<dyn RateLimitStore> = match config.rate_limit_store {
        RateStoreKind::File => {
            let dir = config.rate_limit_dir();
            tracing::info!(dir = %dir.display(), "Rate limit records kept on disk");
            Arc::new(FileRateStore::new(dir, policy)?)
        }
        RateStoreKind::Memory => Arc::new(MemoryRateStore::new(policy)),
    };

    Ok(store)
}
