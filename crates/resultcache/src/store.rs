use crate::sampling::{extract_event_statistics, extract_time_range, sample_events};
use crate::ResultCacheConfig;
use cwa_domain::error::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

/// The summary handed back to the conversation in place of a full
/// result — the agent sees this instead of the raw event list.
#[derive(Debug, Clone)]
pub struct CachedResultSummary {
    pub cache_id: String,
    pub total_events: usize,
    pub time_range: Value,
    pub sample_events: Vec<Value>,
    pub event_statistics: std::collections::HashMap<String, i64>,
    pub original_tool: String,
    pub original_query: Value,
    pub cached_at: i64,
    pub expires_at: i64,
}

impl CachedResultSummary {
    /// Render the dict shape injected into the conversation, including
    /// the instructions that tell the model how to page through the
    /// rest of the result.
    pub fn to_context_dict(&self, now: i64) -> Value {
        serde_json::json!({
            "cached": true,
            "cache_id": self.cache_id,
            "summary": {
                "total_events": self.total_events,
                "time_range": self.time_range,
                "sample_events": self.sample_events,
                "event_statistics": self.event_statistics,
            },
            "original_query": {
                "tool": self.original_tool,
                "parameters": self.original_query,
            },
            "cache_info": {
                "cached_at": self.cached_at,
                "expires_in_seconds": (self.expires_at - now).max(0),
            },
            "instructions": "This result was cached because it exceeded the context window limit. \
                Use fetch_cached_result_chunk(cache_id, offset, limit) to retrieve specific events. \
                You can also filter by time_range or search_pattern.",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub success: bool,
    pub error: Option<String>,
    pub hint: Option<String>,
    pub cache_id: Option<String>,
    pub events: Vec<Value>,
    pub offset: usize,
    pub limit: usize,
    pub total_filtered: usize,
    pub total_cached: i64,
    pub has_more: bool,
}

pub struct ResultCache {
    conn: Mutex<Connection>,
    config: ResultCacheConfig,
}

impl ResultCache {
    pub fn open(path: impl AsRef<Path>, config: ResultCacheConfig) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::Sqlite(e.to_string()))?;
        restrict_permissions(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), config })
    }

    pub fn open_in_memory(config: ResultCacheConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Sqlite(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), config })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cached_results (
                cache_id TEXT PRIMARY KEY,
                tool_name TEXT NOT NULL,
                query_params TEXT NOT NULL,
                result_data TEXT NOT NULL,
                event_count INTEGER NOT NULL,
                data_size_bytes INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                access_count INTEGER DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_cached_results_expires ON cached_results(expires_at);
            CREATE INDEX IF NOT EXISTS idx_cached_results_created ON cached_results(created_at DESC);",
        )
        .map_err(|e| Error::Sqlite(e.to_string()))?;
        Ok(())
    }

    fn generate_cache_id(tool_name: &str, query_params: &Value) -> String {
        let content = format!("{}:{}", tool_name, canonical_json(query_params));
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("result_{}", &digest[..16])
    }

    /// Store `result` (expected to carry an `events` or `logs` array) and
    /// return the summary to inject into the conversation in its place.
    pub fn cache_result(
        &self,
        tool_name: &str,
        query_params: &Value,
        result: &Value,
        now: i64,
    ) -> Result<CachedResultSummary> {
        let cache_id = Self::generate_cache_id(tool_name, query_params);
        let events: Vec<Value> = result
            .get("events")
            .or_else(|| result.get("logs"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let event_stats = extract_event_statistics(&events);
        let time_range = extract_time_range(&events);
        let sample = sample_events(&events, self.config.sample_size);

        let result_json = serde_json::to_string(result)?;
        let data_size = result_json.len() as i64;
        let expires_at = now + self.config.default_ttl_secs as i64;

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR REPLACE INTO cached_results
                 (cache_id, tool_name, query_params, result_data, event_count,
                  data_size_bytes, created_at, expires_at, last_accessed, access_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)",
                params![
                    cache_id,
                    tool_name,
                    serde_json::to_string(query_params)?,
                    result_json,
                    events.len() as i64,
                    data_size,
                    now,
                    expires_at,
                    now,
                ],
            )
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        }

        tracing::info!(cache_id = %cache_id, events = events.len(), data_size, "cached large tool result");
        self.enforce_size_limit()?;

        Ok(CachedResultSummary {
            cache_id,
            total_events: events.len(),
            time_range,
            sample_events: sample,
            event_statistics: event_stats,
            original_tool: tool_name.to_string(),
            original_query: query_params.clone(),
            cached_at: now,
            expires_at,
        })
    }

    /// Page through a cached result's events, optionally filtered by a
    /// case-insensitive text pattern and/or a timestamp window. `limit`
    /// is clamped to 200.
    pub fn fetch_chunk(
        &self,
        cache_id: &str,
        offset: usize,
        limit: usize,
        filter_pattern: Option<&str>,
        time_start: Option<i64>,
        time_end: Option<i64>,
        now: i64,
    ) -> ChunkResult {
        let limit = limit.min(200);

        let row: Option<(String, i64, i64)> = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT result_data, event_count, expires_at FROM cached_results WHERE cache_id = ?1",
                params![cache_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .ok()
        };

        let Some((result_data, event_count, expires_at)) = row else {
            return ChunkResult {
                success: false,
                error: Some(format!("Cache entry '{cache_id}' not found")),
                hint: Some("The cached result may have expired. Re-run the original query.".into()),
                cache_id: None,
                events: vec![],
                offset,
                limit,
                total_filtered: 0,
                total_cached: 0,
                has_more: false,
            };
        };

        if expires_at < now {
            let conn = self.conn.lock();
            let _ = conn.execute("DELETE FROM cached_results WHERE cache_id = ?1", params![cache_id]);
            return ChunkResult {
                success: false,
                error: Some(format!("Cache entry '{cache_id}' has expired")),
                hint: Some("Re-run the original query to get fresh results.".into()),
                cache_id: None,
                events: vec![],
                offset,
                limit,
                total_filtered: 0,
                total_cached: 0,
                has_more: false,
            };
        }

        {
            let conn = self.conn.lock();
            let _ = conn.execute(
                "UPDATE cached_results SET last_accessed = ?1, access_count = access_count + 1 WHERE cache_id = ?2",
                params![now, cache_id],
            );
        }

        let Ok(result): std::result::Result<Value, _> = serde_json::from_str(&result_data) else {
            let corruption = Error::CacheCorruption(cache_id.to_string());
            tracing::warn!(error = %corruption, "deleted corrupted cache entry");
            let conn = self.conn.lock();
            let _ = conn.execute("DELETE FROM cached_results WHERE cache_id = ?1", params![cache_id]);
            return ChunkResult {
                success: false,
                error: Some("Failed to parse cached result".into()),
                hint: Some(format!(
                    "action_required: cache entry '{cache_id}' was corrupted and has been deleted. Re-run the original query."
                )),
                cache_id: None,
                events: vec![],
                offset,
                limit,
                total_filtered: 0,
                total_cached: event_count,
                has_more: false,
            };
        };

        let events: Vec<Value> = result
            .get("events")
            .or_else(|| result.get("logs"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut filtered: Vec<Value> = events;
        if let Some(pattern) = filter_pattern {
            let needle = pattern.to_lowercase();
            filtered.retain(|e| {
                e.get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
        }
        if let Some(start) = time_start {
            filtered.retain(|e| e.get("timestamp").and_then(|t| t.as_i64()).unwrap_or(0) >= start);
        }
        if let Some(end) = time_end {
            filtered.retain(|e| e.get("timestamp").and_then(|t| t.as_i64()).unwrap_or(i64::MAX) <= end);
        }

        let total_filtered = filtered.len();
        let chunk: Vec<Value> = filtered.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + chunk.len() < total_filtered;

        ChunkResult {
            success: true,
            error: None,
            hint: None,
            cache_id: Some(cache_id.to_string()),
            total_filtered,
            total_cached: event_count,
            has_more,
            offset,
            limit,
            events: chunk,
        }
    }

    pub fn delete_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let n = conn
            .execute("DELETE FROM cached_results WHERE expires_at < ?1", params![now])
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        if n > 0 {
            tracing::info!(deleted = n, "deleted expired result-cache entries");
        }
        Ok(n)
    }

    /// Evict the least-recently-accessed entries until usage drops to the
    /// configured target fraction of the size cap.
    fn enforce_size_limit(&self) -> Result<()> {
        let max_size_bytes = (self.config.max_size_mb * 1024 * 1024) as i64;
        let conn = self.conn.lock();

        let current_size: i64 = conn
            .query_row("SELECT COALESCE(SUM(data_size_bytes), 0) FROM cached_results", [], |r| r.get(0))
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        if current_size <= max_size_bytes {
            return Ok(());
        }

        let target_size = (max_size_bytes as f64 * self.config.evict_target_pct) as i64;

        let mut stmt = conn
            .prepare("SELECT cache_id, data_size_bytes FROM cached_results ORDER BY last_accessed ASC")
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .map_err(|e| Error::Sqlite(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        let mut freed = 0i64;
        let mut to_delete = Vec::new();
        for (cache_id, size) in rows {
            if current_size - freed <= target_size {
                break;
            }
            to_delete.push(cache_id);
            freed += size;
        }

        if !to_delete.is_empty() {
            let placeholders = to_delete.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!("DELETE FROM cached_results WHERE cache_id IN ({placeholders})");
            let params: Vec<&dyn rusqlite::ToSql> = to_delete.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            conn.execute(&sql, params.as_slice()).map_err(|e| Error::Sqlite(e.to_string()))?;
            tracing::info!(evicted = to_delete.len(), "evicted cached results to enforce size limit");
        }

        Ok(())
    }

    pub fn get_statistics(&self) -> Result<ResultCacheStats> {
        let conn = self.conn.lock();
        let (entry_count, total_size_bytes, total_events, total_accesses): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(data_size_bytes), 0),
                        COALESCE(SUM(event_count), 0), COALESCE(SUM(access_count), 0)
                 FROM cached_results",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .map_err(|e| Error::Sqlite(e.to_string()))?;

        Ok(ResultCacheStats {
            entry_count,
            total_size_bytes,
            total_events,
            total_accesses,
            max_size_mb: self.config.max_size_mb,
            ttl_seconds: self.config.default_ttl_secs,
        })
    }

    /// Administrative sweep: attempt to deserialize every row's
    /// `result_data` and delete any that fail to parse. Returns the
    /// scan counts, including the ids deleted, for an operator to act
    /// on or just log.
    pub fn validate_and_clean(&self) -> Result<ValidationReport> {
        let rows: Vec<(String, String)> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT cache_id, result_data FROM cached_results")
                .map_err(|e| Error::Sqlite(e.to_string()))?;
            stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
                .map_err(|e| Error::Sqlite(e.to_string()))?
                .filter_map(|r| r.ok())
                .collect()
        };

        let total_entries = rows.len();
        let corrupted_ids: Vec<String> = rows
            .into_iter()
            .filter_map(|(cache_id, result_data)| {
                serde_json::from_str::<Value>(&result_data).err().map(|_| cache_id)
            })
            .collect();

        if !corrupted_ids.is_empty() {
            let conn = self.conn.lock();
            let placeholders = corrupted_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!("DELETE FROM cached_results WHERE cache_id IN ({placeholders})");
            let params: Vec<&dyn rusqlite::ToSql> = corrupted_ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            conn.execute(&sql, params.as_slice()).map_err(|e| Error::Sqlite(e.to_string()))?;
            tracing::warn!(
                corrupted = corrupted_ids.len(),
                total = total_entries,
                "validate_and_clean removed corrupted cache entries"
            );
        }

        let corrupted_count = corrupted_ids.len();
        let corruption_rate = if total_entries == 0 { 0.0 } else { corrupted_count as f64 / total_entries as f64 };

        Ok(ValidationReport {
            total_entries,
            corrupted_count,
            corrupted_ids,
            corruption_rate,
        })
    }
}

/// Result of [`ResultCache::validate_and_clean`]'s corruption sweep.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub total_entries: usize,
    pub corrupted_count: usize,
    pub corrupted_ids: Vec<String>,
    pub corruption_rate: f64,
}

/// Restrict a freshly created cache file to owner-only access. Cached
/// results can retain log excerpts that survived sanitization, so the
/// file shouldn't be group/world readable on platforms that support
/// Unix permission bits. No-op on platforms that don't.
fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ResultCacheStats {
    pub entry_count: i64,
    pub total_size_bytes: i64,
    pub total_events: i64,
    pub total_accesses: i64,
    pub max_size_mb: u64,
    pub ttl_seconds: u64,
}

fn canonical_json(value: &Value) -> String {
    // serde_json::Map sorts keys (BTreeMap), matching Python's
    // `json.dumps(..., sort_keys=True)`.
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ResultCache {
        ResultCache::open_in_memory(ResultCacheConfig::default()).unwrap()
    }

    fn sample_result(n: usize) -> Value {
        let events: Vec<Value> = (0..n)
            .map(|i| serde_json::json!({"message": format!("event {i}"), "timestamp": i as i64}))
            .collect();
        serde_json::json!({"events": events})
    }

    #[test]
    fn cache_result_returns_summary_with_samples() {
        let c = cache();
        let summary = c.cache_result("fetch_logs", &serde_json::json!({"log_group": "/a"}), &sample_result(1000), 1000).unwrap();
        assert_eq!(summary.total_events, 1000);
        assert!(summary.sample_events.len() <= 5);
        assert!(summary.cache_id.starts_with("result_"));
    }

    #[test]
    fn fetch_chunk_paginates() {
        let c = cache();
        let summary = c.cache_result("fetch_logs", &serde_json::json!({}), &sample_result(50), 1000).unwrap();
        let chunk = c.fetch_chunk(&summary.cache_id, 0, 10, None, None, None, 1000);
        assert!(chunk.success);
        assert_eq!(chunk.events.len(), 10);
        assert!(chunk.has_more);
    }

    #[test]
    fn fetch_chunk_missing_cache_id_fails_gracefully() {
        let c = cache();
        let chunk = c.fetch_chunk("result_doesnotexist", 0, 10, None, None, None, 1000);
        assert!(!chunk.success);
        assert!(chunk.error.is_some());
    }

    #[test]
    fn fetch_chunk_expired_entry_is_deleted_and_reported() {
        let c = cache();
        let summary = c.cache_result("fetch_logs", &serde_json::json!({}), &sample_result(5), 1000).unwrap();
        let far_future = summary.expires_at + 10_000;
        let chunk = c.fetch_chunk(&summary.cache_id, 0, 10, None, None, None, far_future);
        assert!(!chunk.success);
        assert!(chunk.error.unwrap().contains("expired"));
    }

    #[test]
    fn fetch_chunk_filters_by_pattern() {
        let c = cache();
        let summary = c.cache_result("fetch_logs", &serde_json::json!({}), &sample_result(20), 1000).unwrap();
        let chunk = c.fetch_chunk(&summary.cache_id, 0, 100, Some("event 1"), None, None, 1000);
        assert!(chunk.success);
        assert!(chunk.events.iter().all(|e| e["message"].as_str().unwrap().contains("event 1")));
    }

    #[test]
    fn context_dict_includes_fetch_instructions() {
        let c = cache();
        let summary = c.cache_result("fetch_logs", &serde_json::json!({}), &sample_result(1000), 1000).unwrap();
        let dict = summary.to_context_dict(1000);
        assert_eq!(dict["cached"], true);
        assert!(dict["instructions"].as_str().unwrap().contains("fetch_cached_result_chunk"));
    }

    #[test]
    fn fetch_chunk_corrupted_entry_is_deleted_and_flagged() {
        let c = cache();
        {
            let conn = c.conn.lock();
            conn.execute(
                "INSERT INTO cached_results
                 (cache_id, tool_name, query_params, result_data, event_count,
                  data_size_bytes, created_at, expires_at, last_accessed, access_count)
                 VALUES ('result_bad', 'fetch_logs', '{}', 'not valid json', 1, 10, 1000, 5000, 1000, 0)",
                [],
            )
            .unwrap();
        }
        let chunk = c.fetch_chunk("result_bad", 0, 10, None, None, None, 1000);
        assert!(!chunk.success);
        assert!(chunk.hint.as_deref().unwrap().starts_with("action_required"));

        let remaining: i64 = {
            let conn = c.conn.lock();
            conn.query_row("SELECT COUNT(*) FROM cached_results WHERE cache_id = 'result_bad'", [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(remaining, 0);
    }

    #[test]
    fn validate_and_clean_removes_only_corrupted_rows() {
        let c = cache();
        let good = c.cache_result("fetch_logs", &serde_json::json!({}), &sample_result(5), 1000).unwrap();
        {
            let conn = c.conn.lock();
            conn.execute(
                "INSERT INTO cached_results
                 (cache_id, tool_name, query_params, result_data, event_count,
                  data_size_bytes, created_at, expires_at, last_accessed, access_count)
                 VALUES ('result_bad', 'fetch_logs', '{}', 'not valid json', 1, 10, 1000, 5000, 1000, 0)",
                [],
            )
            .unwrap();
        }

        let report = c.validate_and_clean().unwrap();
        assert_eq!(report.total_entries, 2);
        assert_eq!(report.corrupted_count, 1);
        assert_eq!(report.corrupted_ids, vec!["result_bad".to_string()]);
        assert!((report.corruption_rate - 0.5).abs() < f64::EPSILON);

        let chunk = c.fetch_chunk(&good.cache_id, 0, 10, None, None, None, 1000);
        assert!(chunk.success);
        let chunk = c.fetch_chunk("result_bad", 0, 10, None, None, None, 1000);
        assert!(!chunk.success);
    }

    #[test]
    #[cfg(unix)]
    fn on_disk_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result_cache.db");
        let _cache = ResultCache::open(&path, ResultCacheConfig::default()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
