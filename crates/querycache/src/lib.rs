//! Deterministic memoization of CloudWatch tool calls, backed by SQLite.
//!
//! Keys are content-addressed (query type + normalized parameters), so
//! identical tool calls made seconds apart within the same minute bucket
//! hit the cache instead of re-querying CloudWatch.

mod key;
mod store;
mod sweeper;

pub use cwa_domain::config::QueryCacheConfig;
pub use key::{calculate_ttl, generate_cache_key};
pub use store::{QueryCache, QueryCacheEntry, QueryCacheStats};
pub use sweeper::spawn_cleanup_task;
