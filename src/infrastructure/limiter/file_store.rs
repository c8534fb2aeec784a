use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::rate_limiter::{Admission, RateLimitError, RateLimitStore, RatePolicy, RateRecord};

pub const FILE_PREFIX: &str = "contact_rate_";

/// One JSON file per client key, `{"attempts": [...]}`.
///
/// Read-modify-write for a key happens under that key's lock, on the blocking
/// pool. Files are replaced through a rename so readers never see a partial
/// write.
#[derive(Clone)]
pub struct FileRateStore {
    dir: PathBuf,
    policy: RatePolicy,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FileRateStore {
    pub fn new(dir: impl Into<PathBuf>, policy: RatePolicy) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            policy,
            locks: Arc::new(DashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{key}"))
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    async fn with_record<F, T>(&self, key: &str, f: F) -> Result<T, RateLimitError>
    where
        F: FnOnce(&Path) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let lock = self.key_lock(key);
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock();
            f(&path)
        })
        .await
        .map_err(|e| RateLimitError::Task(e.to_string()))?
        .map_err(RateLimitError::from)
    }
}

/// Missing, unreadable or corrupt files all read as an empty history.
fn read_record(path: &Path) -> RateRecord {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt rate limit record, treating as empty");
            RateRecord::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => RateRecord::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable rate limit record, treating as empty");
            RateRecord::default()
        }
    }
}

fn write_record(path: &Path, record: &RateRecord) -> io::Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp, serde_json::to_vec(record)?)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

#[async_trait]
impl RateLimitStore for FileRateStore {
    async fn check(&self, key: &str, now: i64) -> Result<Admission, RateLimitError> {
        let policy = self.policy;
        self.with_record(key, move |path| {
            let mut record = read_record(path);
            record.prune(now, policy.window_secs);
            Ok(record.admission(&policy, now))
        })
        .await
    }

    async fn try_record(&self, key: &str, now: i64) -> Result<Admission, RateLimitError> {
        let policy = self.policy;
        self.with_record(key, move |path| {
            let mut record = read_record(path);
            let admission = record.try_push(&policy, now);
            if admission.is_allowed() {
                write_record(path, &record)?;
            }
            Ok(admission)
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, RateLimitError> {
        let dir = self.dir.clone();
        let window = self.policy.window_secs;
        let locks = Arc::clone(&self.locks);

        tokio::task::spawn_blocking(move || -> io::Result<usize> {
            let mut removed = 0;
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let Some(key) = file_name
                    .to_str()
                    .and_then(|name| name.strip_prefix(FILE_PREFIX))
                    .filter(|key| !key.contains('.'))
                else {
                    continue;
                };

                let lock = Arc::clone(
                    locks
                        .entry(key.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .value(),
                );
                let _guard = lock.lock();

                let path = entry.path();
                let mut record = read_record(&path);
                record.prune(now, window);
                if record.attempts.is_empty() {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }

            // Only locks nobody else holds a handle to can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Ok(removed)
        })
        .await
        .map_err(|e| RateLimitError::Task(e.to_string()))?
        .map_err(RateLimitError::from)
    }

    fn policy(&self) -> RatePolicy {
        self.policy
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}
