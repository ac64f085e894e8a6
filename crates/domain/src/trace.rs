use serde::Serialize;

/// Structured trace events emitted across the agent runtime. These
/// integrate with the `tracing` crate and are machine-parseable.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TurnStarted {
        user_message_chars: usize,
    },
    ToolCallDispatched {
        tool_name: String,
        call_id: String,
    },
    ToolCallCompleted {
        tool_name: String,
        call_id: String,
        is_error: bool,
    },
    IntentDetected {
        intent: String,
        nudged: bool,
    },
    BudgetPruned {
        messages_removed: usize,
        tokens_freed: u32,
    },
    ResultCached {
        cache_id: String,
        total_events: usize,
    },
    QueryCacheHit {
        cache_key: String,
    },
    QueryCacheMiss {
        cache_key: String,
    },
    SanitizationApplied {
        redaction_count: usize,
    },
    LogGroupsLoaded {
        count: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cwa_event");
    }
}
