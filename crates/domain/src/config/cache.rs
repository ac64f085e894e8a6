use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query cache (deterministic tool-call memoization)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCacheConfig {
    #[serde(default = "d_query_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "d_query_max_entries")]
    pub max_entries: usize,
    #[serde(default = "d_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Eviction stops once usage falls to this fraction of either cap.
    #[serde(default = "d_evict_target_pct")]
    pub evict_target_pct: f64,
    #[serde(default = "d_evict_batch_size")]
    pub evict_batch_size: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: d_query_max_size_mb(),
            max_entries: d_query_max_entries(),
            cleanup_interval_secs: d_cleanup_interval_secs(),
            evict_target_pct: d_evict_target_pct(),
            evict_batch_size: d_evict_batch_size(),
        }
    }
}

fn d_query_max_size_mb() -> u64 {
    500
}
fn d_query_max_entries() -> usize {
    10_000
}
fn d_cleanup_interval_secs() -> u64 {
    300
}
fn d_evict_target_pct() -> f64 {
    0.90
}
fn d_evict_batch_size() -> usize {
    100
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Result cache (out-of-context tool result storage)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCacheConfig {
    #[serde(default = "d_result_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "d_result_evict_target_pct")]
    pub evict_target_pct: f64,
    #[serde(default = "d_default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Max number of representative sample events shown alongside a
    /// cached-result summary.
    #[serde(default = "d_sample_size")]
    pub sample_size: usize,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: d_result_max_size_mb(),
            evict_target_pct: d_result_evict_target_pct(),
            default_ttl_secs: d_default_ttl_secs(),
            sample_size: d_sample_size(),
        }
    }
}

fn d_result_max_size_mb() -> u64 {
    100
}
fn d_result_evict_target_pct() -> f64 {
    0.80
}
fn d_default_ttl_secs() -> u64 {
    3_600
}
fn d_sample_size() -> usize {
    5
}
