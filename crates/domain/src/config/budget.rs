use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context budget allocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the remaining token budget (after system prompt, response reserve,
/// and safety buffer) splits between conversation history and tool
/// results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// 55% history / 45% results.
    Adaptive,
    /// 65% history / 35% results.
    HistoryFocused,
    /// 60% results / 40% history.
    ResultFocused,
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::Adaptive
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Total context window, in tokens, of the model backing the session.
    #[serde(default = "d_context_window_tokens")]
    pub context_window_tokens: u32,
    #[serde(default = "d_safety_buffer_pct")]
    pub safety_buffer_pct: f64,
    #[serde(default = "d_response_reserve_pct")]
    pub response_reserve_pct: f64,
    #[serde(default = "d_system_prompt_pct")]
    pub system_prompt_pct: f64,
    #[serde(default)]
    pub strategy: AllocationStrategy,
    /// Fraction of the history allocation at which pruning kicks in.
    #[serde(default = "d_prune_threshold_pct")]
    pub prune_threshold_pct: f64,
    /// Number of most-recent messages never eligible for pruning.
    #[serde(default = "d_preserve_recent")]
    pub preserve_recent: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: d_context_window_tokens(),
            safety_buffer_pct: d_safety_buffer_pct(),
            response_reserve_pct: d_response_reserve_pct(),
            system_prompt_pct: d_system_prompt_pct(),
            strategy: AllocationStrategy::default(),
            prune_threshold_pct: d_prune_threshold_pct(),
            preserve_recent: d_preserve_recent(),
        }
    }
}

fn d_context_window_tokens() -> u32 {
    128_000
}
fn d_safety_buffer_pct() -> f64 {
    0.05
}
fn d_response_reserve_pct() -> f64 {
    0.04
}
fn d_system_prompt_pct() -> f64 {
    0.05
}
fn d_prune_threshold_pct() -> f64 {
    0.80
}
fn d_preserve_recent() -> usize {
    4
}
