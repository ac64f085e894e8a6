//! Stores tool results too large to fit in the context window outside
//! the conversation, returning the LLM a compact summary plus a cache id
//! it can use to pull specific chunks back via `fetch_cached_result_chunk`.

mod sampling;
mod store;

pub use sampling::{extract_event_statistics, extract_time_range, sample_events};
pub use store::{CachedResultSummary, ChunkResult, ResultCache, ValidationReport};

pub use cwa_domain::config::ResultCacheConfig;
