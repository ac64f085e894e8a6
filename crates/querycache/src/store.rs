use crate::key::{calculate_ttl, generate_cache_key};
use cwa_domain::config::QueryCacheConfig;
use cwa_domain::error::{Error, Result};
use cwa_domain::trace::TraceEvent;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct QueryCacheEntry {
    pub id: String,
    pub query_type: String,
    pub log_group: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub filter_pattern: Option<String>,
    pub payload: serde_json::Value,
    pub payload_size: i64,
    pub log_count: i64,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_accessed: i64,
    pub hit_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct QueryCacheStats {
    pub entry_count: i64,
    pub total_size_bytes: i64,
    pub total_logs: i64,
    pub total_hits: i64,
    pub expired_count: i64,
}

/// A SQLite-backed store for memoized CloudWatch tool calls.
///
/// Every public operation acquires the single shared connection; SQLite
/// serializes writes internally so a `parking_lot::Mutex` is enough to
/// keep concurrent callers from racing on the same connection handle.
pub struct QueryCache {
    conn: Mutex<Connection>,
    config: QueryCacheConfig,
}

impl QueryCache {
    pub fn open(path: impl AsRef<Path>, config: QueryCacheConfig) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::Sqlite(e.to_string()))?;
        restrict_permissions(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    pub fn open_in_memory(config: QueryCacheConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Sqlite(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                id TEXT PRIMARY KEY,
                query_type TEXT NOT NULL,
                log_group TEXT,
                start_time INTEGER,
                end_time INTEGER,
                filter_pattern TEXT,
                payload TEXT NOT NULL,
                payload_size INTEGER,
                log_count INTEGER,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_accessed INTEGER NOT NULL,
                hit_count INTEGER DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_log_group_time
                ON cache_entries(log_group, start_time, end_time);
            CREATE INDEX IF NOT EXISTS idx_expires_at ON cache_entries(expires_at);
            CREATE INDEX IF NOT EXISTS idx_last_accessed ON cache_entries(last_accessed);",
        )
        .map_err(|e| Error::Sqlite(e.to_string()))?;
        Ok(())
    }

    /// Fetch a cached payload, if present and unexpired. A present-but-
    /// expired or JSON-corrupted row is deleted and treated as a miss,
    /// matching the store's self-healing read path.
    pub fn get(
        &self,
        query_type: &str,
        log_group: Option<&str>,
        start_time: Option<i64>,
        end_time: Option<i64>,
        filter_pattern: Option<&str>,
        extra: &[(&str, serde_json::Value)],
        now: i64,
    ) -> Result<Option<serde_json::Value>> {
        let key = generate_cache_key(query_type, log_group, start_time, end_time, filter_pattern, extra);
        let conn = self.conn.lock();

        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT expires_at, payload FROM cache_entries WHERE id = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::Sqlite(e.to_string()))?;

        let Some((expires_at, payload_json)) = row else {
            TraceEvent::QueryCacheMiss { cache_key: key }.emit();
            return Ok(None);
        };

        if expires_at < now {
            conn.execute("DELETE FROM cache_entries WHERE id = ?1", params![key])
                .map_err(|e| Error::Sqlite(e.to_string()))?;
            TraceEvent::QueryCacheMiss { cache_key: key }.emit();
            return Ok(None);
        }

        let payload = match serde_json::from_str(&payload_json) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(cache_key = %key, "dropping corrupted query-cache entry");
                conn.execute("DELETE FROM cache_entries WHERE id = ?1", params![key])
                    .map_err(|e| Error::Sqlite(e.to_string()))?;
                TraceEvent::QueryCacheMiss { cache_key: key }.emit();
                return Ok(None);
            }
        };

        conn.execute(
            "UPDATE cache_entries SET last_accessed = ?1, hit_count = hit_count + 1 WHERE id = ?2",
            params![now, key],
        )
        .map_err(|e| Error::Sqlite(e.to_string()))?;
        TraceEvent::QueryCacheHit { cache_key: key }.emit();

        Ok(Some(payload))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &self,
        query_type: &str,
        payload: &serde_json::Value,
        log_group: Option<&str>,
        start_time: Option<i64>,
        end_time: Option<i64>,
        filter_pattern: Option<&str>,
        extra: &[(&str, serde_json::Value)],
        now: i64,
    ) -> Result<()> {
        let key = generate_cache_key(query_type, log_group, start_time, end_time, filter_pattern, extra);
        let ttl = calculate_ttl(query_type, end_time, now * 1000);
        let payload_json = serde_json::to_string(payload)?;
        let payload_size = payload_json.len() as i64;
        let log_count = payload
            .get("events")
            .or_else(|| payload.get("log_groups"))
            .and_then(|v| v.as_array())
            .map(|a| a.len() as i64)
            .unwrap_or(0);

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT OR REPLACE INTO cache_entries
                 (id, query_type, log_group, start_time, end_time, filter_pattern,
                  payload, payload_size, log_count, created_at, expires_at,
                  last_accessed, hit_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)",
                params![
                    key,
                    query_type,
                    log_group,
                    start_time,
                    end_time,
                    filter_pattern,
                    payload_json,
                    payload_size,
                    log_count,
                    now,
                    now + ttl,
                    now,
                ],
            )
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        }

        self.evict_if_needed()?;
        Ok(())
    }

    pub fn clear(&self, log_group: Option<&str>) -> Result<usize> {
        let conn = self.conn.lock();
        let n = match log_group {
            Some(lg) => conn
                .execute("DELETE FROM cache_entries WHERE log_group = ?1", params![lg])
                .map_err(|e| Error::Sqlite(e.to_string()))?,
            None => conn
                .execute("DELETE FROM cache_entries", [])
                .map_err(|e| Error::Sqlite(e.to_string()))?,
        };
        Ok(n)
    }

    pub fn delete_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM cache_entries WHERE expires_at < ?1", params![now])
            .map_err(|e| Error::Sqlite(e.to_string()))
    }

    fn cache_size(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COALESCE(SUM(payload_size), 0) FROM cache_entries", [], |r| r.get(0))
    }

    fn entry_count(conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))
    }

    /// Evict expired entries first, then least-recently-used entries in
    /// batches, until the store is back under its size/entry caps (to a
    /// 90% target, so eviction doesn't trigger again on the very next
    /// write).
    pub fn evict_if_needed(&self) -> Result<usize> {
        let max_size_bytes = (self.config.max_size_mb * 1024 * 1024) as i64;
        let target_size_bytes = (max_size_bytes as f64 * self.config.evict_target_pct) as i64;
        let max_entries = self.config.max_entries as i64;

        let conn = self.conn.lock();
        let mut current_size = Self::cache_size(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;
        let mut entry_count = Self::entry_count(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;

        if current_size <= max_size_bytes && entry_count <= max_entries {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut total_evicted = conn
            .execute("DELETE FROM cache_entries WHERE expires_at < ?1", params![now])
            .map_err(|e| Error::Sqlite(e.to_string()))?;

        current_size = Self::cache_size(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;
        entry_count = Self::entry_count(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;

        while current_size > target_size_bytes || entry_count > max_entries {
            let batch: Vec<String> = {
                let mut stmt = conn
                    .prepare("SELECT id FROM cache_entries ORDER BY last_accessed ASC LIMIT ?1")
                    .map_err(|e| Error::Sqlite(e.to_string()))?;
                let rows = stmt
                    .query_map(params![self.config.evict_batch_size as i64], |r| r.get::<_, String>(0))
                    .map_err(|e| Error::Sqlite(e.to_string()))?;
                rows.filter_map(|r| r.ok()).collect()
            };
            if batch.is_empty() {
                break;
            }
            let placeholders = batch.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!("DELETE FROM cache_entries WHERE id IN ({placeholders})");
            let params: Vec<&dyn rusqlite::ToSql> = batch.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            let evicted = conn
                .execute(&sql, params.as_slice())
                .map_err(|e| Error::Sqlite(e.to_string()))?;
            total_evicted += evicted;

            current_size = Self::cache_size(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;
            entry_count = Self::entry_count(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;
        }

        if total_evicted > 0 {
            tracing::debug!(total_evicted, "evicted query cache entries");
        }
        Ok(total_evicted)
    }

    pub fn get_statistics(&self) -> Result<QueryCacheStats> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        let entry_count = Self::entry_count(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;
        let total_size_bytes = Self::cache_size(&conn).map_err(|e| Error::Sqlite(e.to_string()))?;
        let total_logs: i64 = conn
            .query_row("SELECT COALESCE(SUM(log_count), 0) FROM cache_entries", [], |r| r.get(0))
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        let total_hits: i64 = conn
            .query_row("SELECT COALESCE(SUM(hit_count), 0) FROM cache_entries", [], |r| r.get(0))
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        let expired_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM cache_entries WHERE expires_at < ?1",
                params![now],
                |r| r.get(0),
            )
            .map_err(|e| Error::Sqlite(e.to_string()))?;

        Ok(QueryCacheStats {
            entry_count,
            total_size_bytes,
            total_logs,
            total_hits,
            expired_count,
        })
    }
}

/// Restrict a freshly created cache file to owner-only access. Cache
/// payloads can contain sanitized-but-still-sensitive log excerpts, so
/// the file shouldn't be group/world readable on platforms that support
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

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> QueryCache {
        QueryCache::open_in_memory(QueryCacheConfig::default()).unwrap()
    }

    #[test]
    fn miss_then_hit_round_trip() {
        let c = cache();
        let now = 1_700_000_000;
        assert!(c.get("fetch_logs", Some("/g"), None, None, None, &[], now).unwrap().is_none());

        c.set(
            "fetch_logs",
            &serde_json::json!({"events": [1, 2, 3]}),
            Some("/g"),
            None,
            None,
            None,
            &[],
            now,
        )
        .unwrap();

        let hit = c.get("fetch_logs", Some("/g"), None, None, None, &[], now).unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn expired_entry_is_treated_as_miss() {
        let c = cache();
        let now = 1_700_000_000;
        c.set(
            "fetch_logs",
            &serde_json::json!({"events": []}),
            Some("/g"),
            None,
            Some(now * 1000),
            None,
            &[],
            now,
        )
        .unwrap();

        // "fetch_logs" with an end_time older than 5 minutes ago gets a
        // 24h TTL from the `now` it was written at; jump far enough past
        // that to exercise expiry.
        let later = now + 25 * 60 * 60;
        assert!(c
            .get("fetch_logs", Some("/g"), None, Some(now * 1000), None, &[], later)
            .unwrap()
            .is_none());
    }

    #[test]
    fn clear_by_log_group_leaves_others() {
        let c = cache();
        let now = 1_700_000_000;
        c.set("fetch_logs", &serde_json::json!({}), Some("/a"), None, None, None, &[], now).unwrap();
        c.set("fetch_logs", &serde_json::json!({}), Some("/b"), None, None, None, &[], now).unwrap();

        let deleted = c.clear(Some("/a")).unwrap();
        assert_eq!(deleted, 1);
        assert!(c.get("fetch_logs", Some("/b"), None, None, None, &[], now).unwrap().is_some());
    }

    #[test]
    fn statistics_report_entry_and_hit_counts() {
        let c = cache();
        let now = 1_700_000_000;
        c.set("list_log_groups", &serde_json::json!({"log_groups": ["/a", "/b"]}), None, None, None, None, &[], now)
            .unwrap();
        c.get("list_log_groups", None, None, None, None, &[], now).unwrap();

        let stats = c.get_statistics().unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.total_logs, 2);
        assert_eq!(stats.total_hits, 1);
    }

    #[test]
    #[cfg(unix)]
    fn on_disk_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let _cache = QueryCache::open(&path, QueryCacheConfig::default()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
