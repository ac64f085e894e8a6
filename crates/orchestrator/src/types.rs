//! Shared types surfaced across the orchestrator's callback seams:
//! per-tool-call lifecycle records, advisory notifications, and the
//! retry-guidance table keyed by detected condition.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// One lifecycle snapshot of a single tool invocation within a turn,
/// handed to every registered tool listener as the call progresses
/// from `Pending` through `Running` to `Success`/`Error`.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolCallStatus,
    pub arguments: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

/// An advisory event describing something the orchestrator did on the
/// caller's behalf — a result diverted to the cache, history pruned, a
/// budget threshold crossed — surfaced via
/// [`crate::Orchestrator::set_context_notification_callback`].
#[derive(Debug, Clone)]
pub struct ContextNotification {
    pub severity: NotificationSeverity,
    pub message: String,
}

impl ContextNotification {
    pub fn info(message: impl Into<String>) -> Self {
        Self { severity: NotificationSeverity::Info, message: message.into() }
    }
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: NotificationSeverity::Warning, message: message.into() }
    }
}

/// The condition a self-direction nudge is keyed on, used both to pick
/// the guidance text and to enforce "don't inject the same strategy
/// twice in one turn".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryCondition {
    EmptyLogs,
    LogGroupNotFound,
    IntentSearchLogs,
    IntentListLogGroups,
    IntentExpandTime,
    IntentChangeFilter,
}

impl RetryCondition {
    /// The synthetic `system` guidance message injected when this
    /// condition fires. `time_expansion_factor` is the configured
    /// multiplier (`SessionConfig::time_expansion_factor`) suggested for
    /// widening the search window on an `EmptyLogs` condition.
    pub fn guidance(self, time_expansion_factor: f64) -> String {
        match self {
            RetryCondition::EmptyLogs => {
                format!(
                    "No log events were returned. Expand the time range (try roughly {}x wider) \
                     or broaden the filter pattern, then try again.",
                    format_factor(time_expansion_factor)
                )
            }
            RetryCondition::LogGroupNotFound => {
                "The requested log group was not found. Call list_log_groups and retry with the \
                 closest matching name."
                    .to_string()
            }
            RetryCondition::IntentSearchLogs => {
                "You stated an intention to search logs but didn't call a tool. Call fetch_logs \
                 or search_logs now."
                    .to_string()
            }
            RetryCondition::IntentListLogGroups => {
                "You stated an intention to list log groups but didn't call a tool. Call \
                 list_log_groups now."
                    .to_string()
            }
            RetryCondition::IntentExpandTime => {
                "You stated an intention to expand the time range but didn't call a tool. \
                 Re-issue the query with an expanded start_time now."
                    .to_string()
            }
            RetryCondition::IntentChangeFilter => {
                "You stated an intention to change the filter but didn't call a tool. Re-issue \
                 the query with a different filter_pattern now."
                    .to_string()
            }
        }
    }
}

/// Render a multiplier without a trailing `.0` for whole numbers (`4`
/// rather than `4.0`), matching how a human would write it in prose.
fn format_factor(factor: f64) -> String {
    if factor.fract() == 0.0 {
        format!("{}", factor as i64)
    } else {
        format!("{factor}")
    }
}
