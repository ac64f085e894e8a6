use sha2::{Digest, Sha256};

/// Round an epoch-millisecond timestamp down to the enclosing minute, so
/// tool calls issued seconds apart within the same minute share a cache
/// entry.
fn normalize_minute(ms: i64) -> i64 {
    (ms / 60_000) * 60_000
}

/// Build the deterministic cache key for a tool call: a query type plus
/// its parameters, normalized and hashed so parameter order never
/// affects the key.
///
/// `extra` carries any additional tool-specific parameters (e.g. a log
/// group name list, a limit) as already-sorted `(key, value)` pairs.
pub fn generate_cache_key(
    query_type: &str,
    log_group: Option<&str>,
    start_time: Option<i64>,
    end_time: Option<i64>,
    filter_pattern: Option<&str>,
    extra: &[(&str, serde_json::Value)],
) -> String {
    let mut key_parts = serde_json::Map::new();
    key_parts.insert("type".into(), serde_json::Value::String(query_type.into()));
    key_parts.insert(
        "log_group".into(),
        log_group.map(|s| serde_json::Value::String(s.into())).unwrap_or(serde_json::Value::Null),
    );
    key_parts.insert(
        "start".into(),
        start_time
            .map(normalize_minute)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    );
    key_parts.insert(
        "end".into(),
        end_time
            .map(normalize_minute)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    );
    key_parts.insert(
        "filter".into(),
        filter_pattern
            .map(|s| serde_json::Value::String(s.into()))
            .unwrap_or(serde_json::Value::Null),
    );

    let mut extra_sorted: Vec<_> = extra.to_vec();
    extra_sorted.sort_by(|a, b| a.0.cmp(b.0));
    for (k, v) in extra_sorted {
        key_parts.insert(k.to_string(), v);
    }

    // serde_json::Map is a BTreeMap by default, so serialization already
    // emits keys in sorted order, matching the original's `sort_keys=True`.
    let key_string = serde_json::to_string(&serde_json::Value::Object(key_parts))
        .expect("serializing a flat map of JSON scalars cannot fail");

    let mut hasher = Sha256::new();
    hasher.update(key_string.as_bytes());
    hex::encode(hasher.finalize())
}

/// Time-to-live, in seconds, for a cached entry. Recent/live data expires
/// fast; old, immutable historical data is cached much longer.
pub fn calculate_ttl(query_type: &str, end_time: Option<i64>, now_ms: i64) -> i64 {
    match query_type {
        "list_log_groups" => 15 * 60,
        "fetch_logs" | "search_logs" => match end_time {
            None => 60,
            Some(end_time) => {
                let age_minutes = (now_ms - end_time) as f64 / 60_000.0;
                if age_minutes < 5.0 {
                    60
                } else {
                    24 * 60 * 60
                }
            }
        },
        "get_log_statistics" => 5 * 60,
        _ => 60 * 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_regardless_of_extra_param_order() {
        let a = generate_cache_key(
            "fetch_logs",
            Some("/svc/api"),
            Some(1_700_000_000_000),
            Some(1_700_000_060_000),
            None,
            &[("limit", 50.into()), ("ascending", true.into())],
        );
        let b = generate_cache_key(
            "fetch_logs",
            Some("/svc/api"),
            Some(1_700_000_000_000),
            Some(1_700_000_060_000),
            None,
            &[("ascending", true.into()), ("limit", 50.into())],
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn key_normalizes_timestamps_to_minute_boundaries() {
        let a = generate_cache_key("fetch_logs", Some("/g"), Some(1_700_000_000_123), None, None, &[]);
        let b = generate_cache_key("fetch_logs", Some("/g"), Some(1_700_000_000_999), None, None, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn ttl_list_log_groups_is_15_minutes() {
        assert_eq!(calculate_ttl("list_log_groups", None, 0), 900);
    }

    #[test]
    fn ttl_recent_fetch_is_short() {
        let now = 1_700_000_300_000;
        let end_time = 1_700_000_000_000; // 5 minutes before "now"
        assert_eq!(calculate_ttl("fetch_logs", Some(end_time), now), 60 * 60 * 24);

        let recent_end = now - 60_000; // 1 minute ago
        assert_eq!(calculate_ttl("fetch_logs", Some(recent_end), now), 60);
    }

    #[test]
    fn ttl_without_end_time_is_one_minute() {
        assert_eq!(calculate_ttl("search_logs", None, 0), 60);
    }

    #[test]
    fn ttl_default_is_one_hour() {
        assert_eq!(calculate_ttl("unknown_query", None, 0), 3600);
    }
}
