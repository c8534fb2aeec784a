use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use derive_more::Display;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_WINDOW_SECS: i64 = 3600;

/// Sliding window policy: at most `limit` attempts within `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: usize,
    pub window_secs: i64,
}

impl RatePolicy {
    pub fn new(limit: usize, window_secs: i64) -> Self {
        Self { limit, window_secs }
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::new(5, DEFAULT_WINDOW_SECS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Limited { retry_after: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Persisted attempt history for one client, as `{"attempts": [unix_ts, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    #[serde(default)]
    pub attempts: Vec<i64>,
}

impl RateRecord {
    /// Keeps attempts strictly newer than `now - window_secs`.
    pub fn prune(&mut self, now: i64, window_secs: i64) {
        let cutoff = now - window_secs;
        self.attempts.retain(|&ts| ts > cutoff);
    }

    /// Admission for a record that has already been pruned.
    pub fn admission(&self, policy: &RatePolicy, now: i64) -> Admission {
        if self.attempts.len() >= policy.limit {
            let oldest = self.attempts.iter().copied().min().unwrap_or(now);
            let retry_after = (oldest + policy.window_secs - now).max(1) as u64;
            Admission::Limited { retry_after }
        } else {
            Admission::Allowed {
                remaining: policy.limit - self.attempts.len(),
            }
        }
    }

    /// Prunes, then appends `now` if the window has room.
    pub fn try_push(&mut self, policy: &RatePolicy, now: i64) -> Admission {
        self.prune(now, policy.window_secs);
        match self.admission(policy, now) {
            Admission::Allowed { remaining } => {
                self.attempts.push(now);
                Admission::Allowed { remaining: remaining - 1 }
            }
            limited => limited,
        }
    }
}

#[derive(Debug, Display)]
pub enum RateLimitError {
    #[display("rate store I/O error: {_0}")]
    Io(std::io::Error),

    #[display("rate store task failed: {_0}")]
    Task(String),
}

impl std::error::Error for RateLimitError {}

impl From<std::io::Error> for RateLimitError {
    fn from(err: std::io::Error) -> Self {
        RateLimitError::Io(err)
    }
}

/// Keyed attempt store behind the contact endpoint.
///
/// `try_record` must be atomic per key: two concurrent callers can never both
/// take the last free slot of a window.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, key: &str, now: i64) -> Result<Admission, RateLimitError>;

    async fn try_record(&self, key: &str, now: i64) -> Result<Admission, RateLimitError>;

    /// Drops records with no attempt left inside the window.
    async fn purge_expired(&self, now: i64) -> Result<usize, RateLimitError>;

    fn policy(&self) -> RatePolicy;

    fn kind(&self) -> &'static str;
}

#[async_trait]
impl<T> RateLimitStore for Arc<T>
where
    T: RateLimitStore + ?Sized,
{
    async fn check(&self, key: &str, now: i64) -> Result<Admission, RateLimitError> {
        (**self).check(key, now).await
    }

    async fn try_record(&self, key: &str, now: i64) -> Result<Admission, RateLimitError> {
        (**self).try_record(key, now).await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, RateLimitError> {
        (**self).purge_expired(now).await
    }

    fn policy(&self) -> RatePolicy {
        (**self).policy()
    }

    fn kind(&self) -> &'static str {
        (**self).kind()
    }
}

/// Hex SHA-256 of the client address, so raw IPs never reach disk.
pub fn client_key(address: &str) -> String {
    hex::encode(Sha256::digest(address.as_bytes()))
}

type Key = String;

/// In-process store: one mutex-guarded record per key.
#[derive(Clone)]
pub struct MemoryRateStore {
    map: Arc<DashMap<Key, Arc<Mutex<RateRecord>>>>,
    policy: RatePolicy,
}

impl MemoryRateStore {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateStore {
    async fn check(&self, key: &str, now: i64) -> Result<Admission, RateLimitError> {
        let Some(record) = self.map.get(key).map(|entry| Arc::clone(entry.value())) else {
            return Ok(Admission::Allowed { remaining: self.policy.limit });
        };
        let mut record = record.lock();
        record.prune(now, self.policy.window_secs);
        Ok(record.admission(&self.policy, now))
    }

    async fn try_record(&self, key: &str, now: i64) -> Result<Admission, RateLimitError> {
        // The entry guard holds the shard lock until the push lands, so a
        // concurrent purge cannot drop a record that is still empty.
        let entry = self
            .map
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RateRecord::default())));
        let admission = entry.value().lock().try_push(&self.policy, now);
        Ok(admission)
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, RateLimitError> {
        let before = self.map.len();
        let window = self.policy.window_secs;
        self.map.retain(|_, record| {
            let mut record = record.lock();
            record.prune(now, window);
            !record.attempts.is_empty()
        });
        Ok(before.saturating_sub(self.map.len()))
    }

    fn policy(&self) -> RatePolicy {
        self.policy
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
