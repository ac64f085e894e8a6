//! The paging tool the model uses to pull specific events back out of a
//! result that got too large for the conversation and was spilled to
//! the result cache.

use crate::base::Tool;
use async_trait::async_trait;
use chrono::Utc;
use cwa_domain::error::{Error, Result};
use cwa_resultcache::ResultCache;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct FetchCachedResultChunkTool {
    cache: Arc<ResultCache>,
}

impl FetchCachedResultChunkTool {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Tool for FetchCachedResultChunkTool {
    fn name(&self) -> &str {
        "fetch_cached_result_chunk"
    }

    fn description(&self) -> &str {
        "Fetch a chunk of events from a previously cached large result. When a tool result \
         exceeds the context window, it's summarized and cached; use this to page through the \
         full event list, optionally filtering by pattern or time range."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "cache_id": {
                    "type": "string",
                    "description": "The cache identifier returned alongside a cached result summary"
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of events to skip (default: 0)",
                    "minimum": 0
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of events to return (default: 100, max: 200)",
                    "minimum": 1,
                    "maximum": 200
                },
                "filter_pattern": {
                    "type": "string",
                    "description": "Case-insensitive substring to filter event messages by"
                },
                "time_start": {
                    "type": "integer",
                    "description": "Only return events at or after this epoch millisecond timestamp"
                },
                "time_end": {
                    "type": "integer",
                    "description": "Only return events at or before this epoch millisecond timestamp"
                }
            },
            "required": ["cache_id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let cache_id = args
            .get("cache_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ToolExecution("cache_id parameter is required".into()))?;
        let offset = args.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(100)
            .clamp(1, 200) as usize;
        let filter_pattern = args.get("filter_pattern").and_then(Value::as_str);
        let time_start = args.get("time_start").and_then(Value::as_i64);
        let time_end = args.get("time_end").and_then(Value::as_i64);

        let now = Utc::now().timestamp();
        let chunk = self
            .cache
            .fetch_chunk(cache_id, offset, limit, filter_pattern, time_start, time_end, now);

        if !chunk.success {
            return Ok(json!({
                "success": false,
                "error": chunk.error,
                "hint": chunk.hint,
            }));
        }

        let mut result = json!({
            "success": true,
            "events": chunk.events,
            "count": chunk.events.len(),
            "offset": chunk.offset,
            "limit": chunk.limit,
            "total_filtered": chunk.total_filtered,
            "total_cached": chunk.total_cached,
            "has_more": chunk.has_more,
        });

        if filter_pattern.is_some() || time_start.is_some() || time_end.is_some() {
            result["filters_applied"] = json!({
                "pattern": filter_pattern,
                "time_start": time_start,
                "time_end": time_end,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwa_resultcache::ResultCacheConfig;

    fn cache_with_result() -> (Arc<ResultCache>, String) {
        let cache = Arc::new(ResultCache::open_in_memory(ResultCacheConfig::default()).unwrap());
        let events: Vec<Value> = (0..10)
            .map(|i| json!({"timestamp": 1_700_000_000_000i64 + i, "message": format!("event {i}")}))
            .collect();
        let summary = cache
            .cache_result("fetch_logs", &json!({"log_group": "/g"}), &json!({"events": events}), 1_700_000_000)
            .unwrap();
        (cache, summary.cache_id)
    }

    #[tokio::test]
    async fn missing_cache_id_is_an_error() {
        let (cache, _) = cache_with_result();
        let tool = FetchCachedResultChunkTool::new(cache);
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolExecution(_)));
    }

    #[tokio::test]
    async fn unknown_cache_id_returns_graceful_failure() {
        let (cache, _) = cache_with_result();
        let tool = FetchCachedResultChunkTool::new(cache);
        let result = tool.execute(json!({"cache_id": "result_doesnotexist"})).await.unwrap();
        assert_eq!(result["success"], false);
        assert!(result["hint"].is_string());
    }

    #[tokio::test]
    async fn pages_through_cached_events_with_defaults() {
        let (cache, cache_id) = cache_with_result();
        let tool = FetchCachedResultChunkTool::new(cache);
        let result = tool.execute(json!({"cache_id": cache_id})).await.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["count"], 10);
        assert_eq!(result["offset"], 0);
        assert_eq!(result["limit"], 100);
        assert_eq!(result["has_more"], false);
        assert!(result.get("filters_applied").is_none());
    }

    #[tokio::test]
    async fn applies_filter_pattern_and_reports_it() {
        let (cache, cache_id) = cache_with_result();
        let tool = FetchCachedResultChunkTool::new(cache);
        let result = tool
            .execute(json!({"cache_id": cache_id, "filter_pattern": "event 3"}))
            .await
            .unwrap();
        assert_eq!(result["total_filtered"], 1);
        assert_eq!(result["filters_applied"]["pattern"], "event 3");
    }
}
