//! Store configuration

/// Directory holding session records, relative to the store root
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

/// Shard count used by `ShardedLock` when none is configured
pub const DEFAULT_LOCK_SHARDS: usize = 16;

/// Session store configuration
#[derive(Clone, Debug)]
pub struct StoreConfig {
    sessions_dir: String,
    sync_on_save: bool,
    lock_shards: usize,
}

impl StoreConfig {
    /// Create config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different directory name for session records
    #[must_use]
    pub fn with_sessions_dir(mut self, dir: impl Into<String>) -> Self {
        self.sessions_dir = dir.into();
        self
    }

    /// Fsync each record after it is written
    #[must_use]
    pub fn with_sync_on_save(mut self, sync: bool) -> Self {
        self.sync_on_save = sync;
        self
    }

    /// Number of shards for per-recipient locking (at least 1)
    #[must_use]
    pub fn with_lock_shards(mut self, shards: usize) -> Self {
        self.lock_shards = shards.max(1);
        self
    }

    #[must_use]
    pub fn sessions_dir(&self) -> &str {
        &self.sessions_dir
    }

    #[must_use]
    pub fn sync_on_save(&self) -> bool {
        self.sync_on_save
    }

    #[must_use]
    pub fn lock_shards(&self) -> usize {
        self.lock_shards
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sessions_dir: DEFAULT_SESSIONS_DIR.to_string(),
            sync_on_save: true,
            lock_shards: DEFAULT_LOCK_SHARDS,
        }
    }
}
