use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-session orchestrator behavior
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hard ceiling on tool-calling round trips within one turn. Valid
    /// range 1-100; values outside that are clamped by the orchestrator.
    #[serde(default = "d_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "d_max_retry_attempts")]
    pub max_retry_attempts: usize,
    #[serde(default = "d_true")]
    pub auto_retry_enabled: bool,
    #[serde(default = "d_true")]
    pub intent_detection_enabled: bool,
    /// Multiplier applied to the search time range on an `expand_time` nudge.
    #[serde(default = "d_time_expansion_factor")]
    pub time_expansion_factor: f64,
    #[serde(default = "d_true")]
    pub enable_result_caching: bool,
    /// Token threshold above which a tool result is diverted to the result
    /// cache instead of inlined in the conversation.
    #[serde(default = "d_cache_large_results_threshold")]
    pub cache_large_results_threshold: u32,
    #[serde(default = "d_initial_chunk_size")]
    pub initial_chunk_size: usize,
    #[serde(default = "d_true")]
    pub enable_auto_fetch_guidance: bool,
    #[serde(default = "d_true")]
    pub enable_history_pruning: bool,
    #[serde(default = "d_true")]
    pub pii_sanitization_enabled: bool,
    #[serde(default = "d_true")]
    pub log_groups_sidebar_visible: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: d_max_tool_iterations(),
            max_retry_attempts: d_max_retry_attempts(),
            auto_retry_enabled: true,
            intent_detection_enabled: true,
            time_expansion_factor: d_time_expansion_factor(),
            enable_result_caching: true,
            cache_large_results_threshold: d_cache_large_results_threshold(),
            initial_chunk_size: d_initial_chunk_size(),
            enable_auto_fetch_guidance: true,
            enable_history_pruning: true,
            pii_sanitization_enabled: true,
            log_groups_sidebar_visible: true,
        }
    }
}

impl SessionConfig {
    /// Clamp `max_tool_iterations` into the documented 1-100 range.
    pub fn clamped_max_tool_iterations(&self) -> usize {
        self.max_tool_iterations.clamp(1, 100)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_max_tool_iterations() -> usize {
    10
}
fn d_max_retry_attempts() -> usize {
    3
}
fn d_time_expansion_factor() -> f64 {
    4.0
}
fn d_cache_large_results_threshold() -> u32 {
    5_000
}
fn d_initial_chunk_size() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_iterations() {
        let mut cfg = SessionConfig::default();
        cfg.max_tool_iterations = 0;
        assert_eq!(cfg.clamped_max_tool_iterations(), 1);
        cfg.max_tool_iterations = 500;
        assert_eq!(cfg.clamped_max_tool_iterations(), 100);
    }
}
