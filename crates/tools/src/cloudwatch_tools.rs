//! CloudWatch-specific LLM tools: discover log groups, fetch log events
//! from one group, and search across several. Each checks the query
//! cache before hitting CloudWatch and stores its result afterward;
//! `fetch_logs`/`search_logs` additionally sanitize events before they
//! ever reach the model.

use crate::base::Tool;
use async_trait::async_trait;
use chrono::Utc;
use cwa_cloudwatch::time_range::calculate_time_range;
use cwa_cloudwatch::CloudWatchDataSource;
use cwa_domain::error::{Error, Result};
use cwa_querycache::QueryCache;
use cwa_sanitizer::LogSanitizer;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ListLogGroupsTool {
    datasource: Arc<dyn CloudWatchDataSource>,
    cache: Option<Arc<QueryCache>>,
}

impl ListLogGroupsTool {
    pub fn new(datasource: Arc<dyn CloudWatchDataSource>, cache: Option<Arc<QueryCache>>) -> Self {
        Self { datasource, cache }
    }
}

#[async_trait]
impl Tool for ListLogGroupsTool {
    fn name(&self) -> &str {
        "list_log_groups"
    }

    fn description(&self) -> &str {
        "List available CloudWatch log groups. Use this to discover what log groups exist \
         before querying logs. You can optionally filter by prefix to narrow down results \
         (e.g., '/aws/lambda/' to see only Lambda function logs)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prefix": {
                    "type": "string",
                    "description": "Optional prefix to filter log groups (e.g., '/aws/lambda/', \
                        '/ecs/'). Leave empty to list all log groups."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of log groups to return (default: 50, max: 100)",
                    "minimum": 1,
                    "maximum": 100
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let prefix = args.get("prefix").and_then(Value::as_str).map(str::to_string);
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(50) as usize;
        let now = Utc::now().timestamp();
        let extra: Vec<(&str, Value)> = vec![("limit", (limit as i64).into())];

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get("list_log_groups", None, None, None, prefix.as_deref(), &extra, now)? {
                return Ok(cached);
            }
        }

        let groups = self
            .datasource
            .list_log_groups(prefix.as_deref(), limit)
            .await
            .map_err(|e| Error::ToolExecution(format!("Failed to list log groups: {e}")))?;

        let result = json!({
            "success": true,
            "log_groups": groups,
            "count": groups.len(),
            "prefix": prefix,
        });

        if let Some(cache) = &self.cache {
            cache.set("list_log_groups", &result, None, None, None, prefix.as_deref(), &extra, now)?;
        }

        Ok(result)
    }
}

pub struct FetchLogsTool {
    datasource: Arc<dyn CloudWatchDataSource>,
    sanitizer: Arc<LogSanitizer>,
    cache: Option<Arc<QueryCache>>,
}

impl FetchLogsTool {
    pub fn new(
        datasource: Arc<dyn CloudWatchDataSource>,
        sanitizer: Arc<LogSanitizer>,
        cache: Option<Arc<QueryCache>>,
    ) -> Self {
        Self { datasource, sanitizer, cache }
    }
}

#[async_trait]
impl Tool for FetchLogsTool {
    fn name(&self) -> &str {
        "fetch_logs"
    }

    fn description(&self) -> &str {
        "Fetch log events from a specific CloudWatch log group. Use this to retrieve actual \
         log data for analysis. Supports time range filtering and CloudWatch filter patterns \
         for searching specific content (e.g., 'ERROR', 'Exception')."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "log_group": {
                    "type": "string",
                    "description": "The CloudWatch log group name (e.g., '/aws/lambda/my-function')"
                },
                "start_time": {
                    "type": "string",
                    "description": "Start of time range. Supports ISO 8601 (2024-01-15T10:00:00Z), \
                        relative ('1h ago', '30m ago', '2d ago', 'yesterday'), or epoch ms"
                },
                "end_time": {
                    "type": "string",
                    "description": "End of time range. Same formats as start_time. Defaults to \
                        'now' if not specified."
                },
                "filter_pattern": {
                    "type": "string",
                    "description": "CloudWatch filter pattern to search for specific content. \
                        Examples: 'ERROR', '\"Exception\"', '{ $.level = \"error\" }'"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of log events to return (default: 100, max: 1000)",
                    "minimum": 1,
                    "maximum": 1000
                }
            },
            "required": ["log_group", "start_time"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let log_group = args
            .get("log_group")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("log_group parameter is required".into()))?;
        let start_time_str = args
            .get("start_time")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("start_time parameter is required".into()))?;
        let end_time_str = args.get("end_time").and_then(Value::as_str);
        let filter_pattern = args.get("filter_pattern").and_then(Value::as_str);
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;

        let (start_time, end_time) = calculate_time_range(Some(start_time_str), end_time_str)
            .map_err(|e| Error::ToolExecution(format!("Failed to fetch logs: {e}")))?;

        let now = Utc::now().timestamp();
        let extra: Vec<(&str, Value)> = vec![("limit", (limit as i64).into())];

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(
                "fetch_logs",
                Some(log_group),
                Some(start_time),
                Some(end_time),
                filter_pattern,
                &extra,
                now,
            )? {
                return Ok(cached);
            }
        }

        let events = self
            .datasource
            .fetch_logs(log_group, start_time, end_time, filter_pattern, limit, None)
            .await
            .map_err(|e| Error::ToolExecution(format!("Failed to fetch logs: {e}")))?;

        let (sanitized_events, redactions) = self.sanitizer.sanitize_log_events(&events);

        let result = json!({
            "success": true,
            "log_group": log_group,
            "events": sanitized_events,
            "count": sanitized_events.len(),
            "time_range": { "start": start_time, "end": end_time },
            "filter_pattern": filter_pattern,
            "sanitization": {
                "enabled": self.sanitizer.enabled,
                "redactions": redactions,
                "summary": self.sanitizer.get_redaction_summary(&redactions),
            },
        });

        if let Some(cache) = &self.cache {
            cache.set(
                "fetch_logs",
                &result,
                Some(log_group),
                Some(start_time),
                Some(end_time),
                filter_pattern,
                &extra,
                now,
            )?;
        }

        Ok(result)
    }
}

pub struct SearchLogsTool {
    datasource: Arc<dyn CloudWatchDataSource>,
    sanitizer: Arc<LogSanitizer>,
    cache: Option<Arc<QueryCache>>,
}

impl SearchLogsTool {
    pub fn new(
        datasource: Arc<dyn CloudWatchDataSource>,
        sanitizer: Arc<LogSanitizer>,
        cache: Option<Arc<QueryCache>>,
    ) -> Self {
        Self { datasource, sanitizer, cache }
    }
}

#[async_trait]
impl Tool for SearchLogsTool {
    fn name(&self) -> &str {
        "search_logs"
    }

    fn description(&self) -> &str {
        "Search across multiple CloudWatch log groups for a pattern. Use this for \
         cross-service investigation when you need to find logs matching a pattern across \
         multiple services or applications."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "log_group_patterns": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of log group name patterns/prefixes to search. \
                        Example: ['/aws/lambda/', '/ecs/'] to search all Lambda and ECS logs"
                },
                "search_pattern": {
                    "type": "string",
                    "description": "CloudWatch filter pattern to search for across log groups. \
                        Example: 'ERROR', 'timeout', '\"500\"'"
                },
                "start_time": {
                    "type": "string",
                    "description": "Start of time range. Supports ISO 8601, relative ('1h ago'), \
                        or epoch ms"
                },
                "end_time": {
                    "type": "string",
                    "description": "End of time range (defaults to 'now' if not specified)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum total number of log events to return (default: 100, \
                        max: 1000)",
                    "minimum": 1,
                    "maximum": 1000
                }
            },
            "required": ["log_group_patterns", "search_pattern", "start_time"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let patterns: Vec<String> = args
            .get("log_group_patterns")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if patterns.is_empty() {
            return Err(Error::InvalidRequest(
                "log_group_patterns parameter is required and must not be empty".into(),
            ));
        }
        let search_pattern = args
            .get("search_pattern")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("search_pattern parameter is required".into()))?;
        let start_time_str = args
            .get("start_time")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidRequest("start_time parameter is required".into()))?;
        let end_time_str = args.get("end_time").and_then(Value::as_str);
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;

        let (start_time, end_time) = calculate_time_range(Some(start_time_str), end_time_str)
            .map_err(|e| Error::ToolExecution(format!("Failed to search logs: {e}")))?;

        let now = Utc::now().timestamp();
        let mut sorted_patterns = patterns.clone();
        sorted_patterns.sort();
        let extra: Vec<(&str, Value)> = vec![
            ("patterns", serde_json::to_value(&sorted_patterns).unwrap_or(Value::Null)),
            ("limit", (limit as i64).into()),
        ];

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(
                "search_logs",
                None,
                Some(start_time),
                Some(end_time),
                Some(search_pattern),
                &extra,
                now,
            )? {
                return Ok(cached);
            }
        }

        let events = self
            .datasource
            .search_logs(&patterns, search_pattern, start_time, end_time, limit)
            .await
            .map_err(|e| Error::ToolExecution(format!("Failed to search logs: {e}")))?;

        let (sanitized_events, redactions) = self.sanitizer.sanitize_log_events(&events);

        let mut events_by_group: HashMap<String, Vec<Value>> = HashMap::new();
        for event in &sanitized_events {
            let log_stream = event.get("log_stream").and_then(Value::as_str).unwrap_or("unknown");
            let group_key = event
                .get("log_group")
                .and_then(Value::as_str)
                .unwrap_or_else(|| log_stream.split('/').next().unwrap_or("unknown"));
            events_by_group.entry(group_key.to_string()).or_default().push(event.clone());
        }

        let result = json!({
            "success": true,
            "log_group_patterns": patterns,
            "search_pattern": search_pattern,
            "events": sanitized_events,
            "events_by_group": events_by_group,
            "count": sanitized_events.len(),
            "groups_found": events_by_group.len(),
            "time_range": { "start": start_time, "end": end_time },
            "sanitization": {
                "enabled": self.sanitizer.enabled,
                "redactions": redactions,
                "summary": self.sanitizer.get_redaction_summary(&redactions),
            },
        });

        if let Some(cache) = &self.cache {
            cache.set(
                "search_logs",
                &result,
                None,
                Some(start_time),
                Some(end_time),
                Some(search_pattern),
                &extra,
                now,
            )?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwa_cloudwatch::testing::FakeCloudWatchDataSource;
    use cwa_domain::loggroup::LogGroupInfo;
    use cwa_querycache::QueryCacheConfig;

    fn sample_datasource() -> Arc<dyn CloudWatchDataSource> {
        Arc::new(
            FakeCloudWatchDataSource::new(vec![LogGroupInfo {
                name: "/aws/lambda/my-function".into(),
                created: Some(0),
                stored_bytes: 100,
                retention_days: Some(14),
            }])
            .with_events(
                "/aws/lambda/my-function",
                vec![
                    json!({"timestamp": 1_700_000_000_000i64, "message": "hello from 1.2.3.4"}),
                    json!({"timestamp": 1_700_000_001_000i64, "message": "ERROR: boom"}),
                ],
            ),
        )
    }

    #[tokio::test]
    async fn list_log_groups_returns_success_and_count() {
        let tool = ListLogGroupsTool::new(sample_datasource(), None);
        let result = tool.execute(json!({})).await.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["count"], 1);
    }

    #[tokio::test]
    async fn fetch_logs_requires_log_group_and_start_time() {
        let tool = FetchLogsTool::new(sample_datasource(), Arc::new(LogSanitizer::default()), None);
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn fetch_logs_sanitizes_ip_addresses() {
        let tool = FetchLogsTool::new(sample_datasource(), Arc::new(LogSanitizer::default()), None);
        let result = tool
            .execute(json!({
                "log_group": "/aws/lambda/my-function",
                "start_time": "2023-11-14T00:00:00Z",
                "end_time": "2023-11-15T00:00:00Z",
            }))
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        let events = result["events"].as_array().unwrap();
        assert!(events[0]["message"].as_str().unwrap().contains("[IP_REDACTED]"));
    }

    #[tokio::test]
    async fn fetch_logs_caches_results() {
        let cache = Arc::new(QueryCache::open_in_memory(QueryCacheConfig::default()).unwrap());
        let tool = FetchLogsTool::new(
            sample_datasource(),
            Arc::new(LogSanitizer::default()),
            Some(cache.clone()),
        );
        let args = json!({
            "log_group": "/aws/lambda/my-function",
            "start_time": "2023-11-14T00:00:00Z",
            "end_time": "2023-11-15T00:00:00Z",
        });
        let first = tool.execute(args.clone()).await.unwrap();
        let second = tool.execute(args).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.get_statistics().unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn search_logs_requires_non_empty_patterns() {
        let tool = SearchLogsTool::new(sample_datasource(), Arc::new(LogSanitizer::default()), None);
        let err = tool
            .execute(json!({"log_group_patterns": [], "search_pattern": "ERROR", "start_time": "1h ago"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn search_logs_groups_events_by_log_group() {
        let tool = SearchLogsTool::new(sample_datasource(), Arc::new(LogSanitizer::default()), None);
        let result = tool
            .execute(json!({
                "log_group_patterns": ["/aws/lambda/"],
                "search_pattern": "ERROR",
                "start_time": "2023-11-14T00:00:00Z",
                "end_time": "2023-11-15T00:00:00Z",
            }))
            .await
            .unwrap();
        assert_eq!(result["groups_found"], 1);
    }
}
