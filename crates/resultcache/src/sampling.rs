use serde_json::Value;
use std::collections::HashMap;

/// Count events per coarse log level, first-match-wins in
/// ERROR/EXCEPTION > WARN > INFO > DEBUG > OTHER priority order —
/// matches a best-effort heuristic over free-text messages, not a
/// structured log-level field.
pub fn extract_event_statistics(events: &[Value]) -> HashMap<String, i64> {
    let mut stats = HashMap::new();
    for event in events {
        let message = event.get("message").and_then(|v| v.as_str()).unwrap_or("");
        let upper = message.to_uppercase();
        let level = if upper.contains("ERROR") || upper.contains("EXCEPTION") {
            "ERROR"
        } else if upper.contains("WARN") {
            "WARN"
        } else if upper.contains("INFO") {
            "INFO"
        } else if upper.contains("DEBUG") {
            "DEBUG"
        } else {
            "OTHER"
        };
        *stats.entry(level.to_string()).or_insert(0) += 1;
    }
    stats
}

/// `{start, end, span_ms}` over integer `timestamp` fields, or
/// `{start: null, end: null}` when no event carries one.
pub fn extract_time_range(events: &[Value]) -> Value {
    let timestamps: Vec<i64> = events
        .iter()
        .filter_map(|e| e.get("timestamp").and_then(|v| v.as_i64()))
        .collect();

    if timestamps.is_empty() {
        return serde_json::json!({"start": None::<i64>, "end": None::<i64>});
    }

    let min_ts = *timestamps.iter().min().unwrap();
    let max_ts = *timestamps.iter().max().unwrap();
    serde_json::json!({"start": min_ts, "end": max_ts, "span_ms": max_ts - min_ts})
}

/// Representative sample: first event, evenly spaced middle events, and
/// the last event, deduplicated, capped at `count`.
pub fn sample_events(events: &[Value], count: usize) -> Vec<Value> {
    if events.len() <= count {
        return events.to_vec();
    }

    let mut sampled: Vec<Value> = Vec::with_capacity(count);
    sampled.push(events[0].clone());

    if count > 2 {
        let step = events.len() / (count - 1);
        for i in 1..count - 1 {
            let idx = (i * step).min(events.len() - 1);
            if !sampled.contains(&events[idx]) {
                sampled.push(events[idx].clone());
            }
        }
    }

    let last = events.last().unwrap();
    if !sampled.contains(last) {
        sampled.push(last.clone());
    }

    sampled.truncate(count);
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(message: &str, timestamp: Option<i64>) -> Value {
        match timestamp {
            Some(ts) => serde_json::json!({"message": message, "timestamp": ts}),
            None => serde_json::json!({"message": message}),
        }
    }

    #[test]
    fn error_takes_priority_over_other_levels() {
        let events = vec![event("ERROR: boom", None), event("INFO: fine", None)];
        let stats = extract_event_statistics(&events);
        assert_eq!(stats["ERROR"], 1);
        assert_eq!(stats["INFO"], 1);
    }

    #[test]
    fn exception_counts_as_error() {
        let events = vec![event("NullPointerException thrown", None)];
        let stats = extract_event_statistics(&events);
        assert_eq!(stats["ERROR"], 1);
    }

    #[test]
    fn unclassified_message_is_other() {
        let events = vec![event("request completed", None)];
        let stats = extract_event_statistics(&events);
        assert_eq!(stats["OTHER"], 1);
    }

    #[test]
    fn time_range_empty_when_no_timestamps() {
        let range = extract_time_range(&[event("no ts", None)]);
        assert!(range["start"].is_null());
    }

    #[test]
    fn time_range_spans_min_to_max() {
        let events = vec![event("a", Some(100)), event("b", Some(50)), event("c", Some(200))];
        let range = extract_time_range(&events);
        assert_eq!(range["start"], 50);
        assert_eq!(range["end"], 200);
        assert_eq!(range["span_ms"], 150);
    }

    #[test]
    fn sampling_under_count_returns_all() {
        let events: Vec<Value> = (0..3).map(|i| event(&format!("e{i}"), None)).collect();
        assert_eq!(sample_events(&events, 5).len(), 3);
    }

    #[test]
    fn sampling_over_count_includes_first_and_last() {
        let events: Vec<Value> = (0..50).map(|i| event(&format!("e{i}"), Some(i))).collect();
        let sample = sample_events(&events, 5);
        assert!(sample.len() <= 5);
        assert_eq!(sample.first().unwrap()["timestamp"], 0);
        assert_eq!(sample.last().unwrap()["timestamp"], 49);
    }
}
