use crate::allocation::{estimate_tokens, BudgetAllocation};
use cwa_domain::config::BudgetConfig;

/// A single conversation-history entry tracked by the budget, independent
/// of the richer `cwa_domain::tool::Message` shape used on the wire —
/// the tracker only needs role, rendered text, a token count, and
/// whether it's protected from pruning.
#[derive(Debug, Clone)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
    pub tokens: u32,
    /// System/synthetic-guidance messages are never pruned, matching
    /// the reference tracker's `msg.is_system or msg.important` check.
    pub important: bool,
}

/// Point-in-time snapshot of budget consumption, suitable for surfacing
/// to a user or log line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetUsage {
    pub system_prompt_tokens: u32,
    pub history_tokens: u32,
    pub result_tokens: u32,
    pub total_tokens: u32,
    pub total_budget: u32,
    pub history_pct_used: f64,
}

pub struct ContextBudgetTracker {
    config: BudgetConfig,
    allocation: BudgetAllocation,
    system_prompt_tokens: u32,
    messages: Vec<ContextMessage>,
    result_tokens_used: u32,
}

impl ContextBudgetTracker {
    pub fn new(config: BudgetConfig) -> Self {
        let allocation = BudgetAllocation::compute(&config);
        Self {
            config,
            allocation,
            system_prompt_tokens: 0,
            messages: Vec::new(),
            result_tokens_used: 0,
        }
    }

    pub fn allocation(&self) -> BudgetAllocation {
        self.allocation
    }

    pub fn set_system_prompt(&mut self, text: &str) {
        self.system_prompt_tokens = estimate_tokens(text);
    }

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>, important: bool) -> u32 {
        let content = content.into();
        let tokens = estimate_tokens(&content);
        self.messages.push(ContextMessage {
            role: role.into(),
            content,
            tokens,
            important,
        });
        tokens
    }

    /// Whether `additional_tokens` more of conversation history still fits
    /// within the history allocation.
    pub fn can_fit(&self, additional_tokens: u32) -> bool {
        self.history_tokens() + additional_tokens <= self.allocation.history
    }

    /// Whether a tool result of this size should be diverted to the
    /// result cache instead of inlined into the conversation.
    pub fn should_cache_result(&self, result_tokens: u32, threshold: u32) -> bool {
        result_tokens > threshold || !self.can_fit_result(result_tokens)
    }

    fn can_fit_result(&self, tokens: u32) -> bool {
        self.result_tokens_used + tokens <= self.allocation.results
    }

    /// Record that `tokens` worth of tool-result content has been
    /// inlined (as opposed to diverted to the result cache).
    pub fn record_result_tokens(&mut self, tokens: u32) {
        self.result_tokens_used += tokens;
    }

    fn history_tokens(&self) -> u32 {
        self.messages.iter().map(|m| m.tokens).sum()
    }

    pub fn get_usage(&self) -> BudgetUsage {
        let history_tokens = self.history_tokens();
        let total_tokens = self.system_prompt_tokens + history_tokens + self.result_tokens_used;
        let history_pct_used = if self.allocation.history == 0 {
            0.0
        } else {
            history_tokens as f64 / self.allocation.history as f64 * 100.0
        };
        BudgetUsage {
            system_prompt_tokens: self.system_prompt_tokens,
            history_tokens,
            result_tokens: self.result_tokens_used,
            total_tokens,
            total_budget: self.allocation.total(),
            history_pct_used,
        }
    }

    /// Whether history consumption has crossed the configured prune
    /// threshold (default 80% of the history allocation).
    pub fn should_prune_history(&self) -> bool {
        self.get_usage().history_pct_used >= self.config.prune_threshold_pct * 100.0
    }

    /// Indices into the message list eligible for pruning: every message
    /// outside the `preserve_recent` most-recent ones, excluding any
    /// marked `important` (system/synthetic-guidance messages are never
    /// pruned, regardless of age).
    pub fn get_prunable_messages(&self) -> Vec<usize> {
        let len = self.messages.len();
        let preserve = self.config.preserve_recent.min(len);
        let cutoff = len - preserve;
        (0..cutoff).filter(|&i| !self.messages[i].important).collect()
    }

    /// Remove oldest prunable messages, in order, until usage drops back
    /// under the prune threshold or no prunable messages remain.
    /// Returns the number of messages removed and tokens freed.
    pub fn prune_messages(&mut self) -> (usize, u32) {
        let (indices, tokens_freed) = self.prune_messages_indexed();
        (indices.len(), tokens_freed)
    }

    /// Same as [`Self::prune_messages`] but also returns the original
    /// indices removed (ascending), so a caller keeping a parallel
    /// message list in lockstep (the orchestrator's conversation
    /// history) can drop the same positions and stay in sync.
    pub fn prune_messages_indexed(&mut self) -> (Vec<usize>, u32) {
        let threshold_tokens = self.config.prune_threshold_pct * self.allocation.history as f64;
        let mut projected = self.history_tokens() as f64;
        let mut to_remove = Vec::new();
        let mut tokens_freed = 0u32;

        for idx in self.get_prunable_messages() {
            if projected < threshold_tokens {
                break;
            }
            let tokens = self.messages[idx].tokens;
            to_remove.push(idx);
            tokens_freed += tokens;
            projected -= tokens as f64;
        }

        for &idx in to_remove.iter().rev() {
            self.messages.remove(idx);
        }
        if !to_remove.is_empty() {
            tracing::debug!(removed = to_remove.len(), tokens_freed, "pruned context history");
        }
        (to_remove, tokens_freed)
    }

    /// Clear conversation history and result usage, keeping the system
    /// prompt and allocation in place (used between independent turns
    /// that intentionally reset context, not between process lifetimes).
    pub fn reset(&mut self) {
        self.messages.clear();
        self.result_tokens_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ContextBudgetTracker {
        ContextBudgetTracker::new(BudgetConfig {
            context_window_tokens: 1_000,
            ..BudgetConfig::default()
        })
    }

    #[test]
    fn empty_tracker_reports_zero_usage() {
        let t = tracker();
        let usage = t.get_usage();
        assert_eq!(usage.history_tokens, 0);
        assert_eq!(usage.result_tokens, 0);
    }

    #[test]
    fn add_message_increases_history_tokens() {
        let mut t = tracker();
        t.add_message("user", "hello there", false);
        assert!(t.get_usage().history_tokens > 0);
    }

    #[test]
    fn can_fit_respects_history_allocation() {
        let t = tracker();
        let alloc = t.allocation();
        assert!(t.can_fit(alloc.history));
        assert!(!t.can_fit(alloc.history + 1));
    }

    #[test]
    fn should_cache_result_above_threshold() {
        let t = tracker();
        assert!(t.should_cache_result(6_000, 5_000));
        assert!(!t.should_cache_result(10, 5_000));
    }

    #[test]
    fn prune_preserves_most_recent_messages() {
        let mut t = tracker();
        for i in 0..20 {
            t.add_message("user", format!("message number {i} with enough text to spend tokens"), false);
        }
        let (removed, _) = t.prune_messages();
        assert!(removed > 0);
        assert!(!t.should_prune_history());
        assert!(t.messages.len() >= t.config.preserve_recent.min(20));
    }

    #[test]
    fn prune_never_removes_important_messages() {
        let mut t = tracker();
        t.add_message("system", "synthetic guidance that must survive pruning", true);
        for i in 0..20 {
            t.add_message("user", format!("message number {i} with enough text to spend tokens"), false);
        }
        let (indices, _) = t.prune_messages_indexed();
        assert!(!indices.contains(&0));
        assert!(t.messages[0].important);
        assert_eq!(t.messages[0].content, "synthetic guidance that must survive pruning");
    }

    #[test]
    fn reset_clears_history_but_keeps_allocation() {
        let mut t = tracker();
        t.add_message("user", "hi", false);
        t.record_result_tokens(10);
        let alloc_before = t.allocation();
        t.reset();
        assert_eq!(t.get_usage().history_tokens, 0);
        assert_eq!(t.get_usage().result_tokens, 0);
        assert_eq!(t.allocation(), alloc_before);
    }
}
