use serde::{Deserialize, Serialize};

/// SQLite storage tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Max wait on a locked database before returning busy (milliseconds).
    pub busy_timeout_ms: u64,
    /// Bounded reader connection pool size for dirty reads.
    pub read_pool_size: u32,
    /// Use write-ahead logging. Required for reads to proceed while the
    /// writer holds its open transaction; disable only for single-role
    /// tooling over an offline database.
    pub wal: bool,
    /// Synchronous pragma level (OFF / NORMAL / FULL).
    pub synchronous: String,
    /// Page cache size in KiB.
    pub cache_size_kib: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            read_pool_size: 8,
            wal: true,
            synchronous: "NORMAL".to_string(),
            cache_size_kib: 64_000,
        }
    }
}

/// State engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Writes taking longer than this are logged as slow (milliseconds,
    /// 0 = disabled).
    pub slow_write_threshold_ms: u64,
    /// Capacity of the applied-write history ring buffer.
    pub history_capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            slow_write_threshold_ms: 5_000,
            history_capacity: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configs_round_trip_through_serde() {
        let storage = StorageConfig::default();
        let json = serde_json::to_string(&storage).unwrap();
        let back: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.busy_timeout_ms, storage.busy_timeout_ms);
        assert_eq!(back.read_pool_size, storage.read_pool_size);
        assert!(back.wal);

        let state = StateConfig::default();
        let json = serde_json::to_string(&state).unwrap();
        let back: StateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.slow_write_threshold_ms, state.slow_write_threshold_ms);
        assert_eq!(back.history_capacity, state.history_capacity);
    }
}
