use cwa_domain::config::{AllocationStrategy, BudgetConfig};

/// Fixed token split derived once from a [`BudgetConfig`]: how many tokens
/// are reserved for the system prompt, the model's own response, a safety
/// buffer, and the remainder split between conversation history and
/// tool results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetAllocation {
    pub system_prompt: u32,
    pub response_reserve: u32,
    pub safety_buffer: u32,
    pub history: u32,
    pub results: u32,
}

impl BudgetAllocation {
    pub fn compute(config: &BudgetConfig) -> Self {
        let total = config.context_window_tokens as f64;
        let system_prompt = (total * config.system_prompt_pct) as u32;
        let response_reserve = (total * config.response_reserve_pct) as u32;
        let safety_buffer = (total * config.safety_buffer_pct) as u32;

        let reserved = system_prompt + response_reserve + safety_buffer;
        let remaining = config.context_window_tokens.saturating_sub(reserved) as f64;

        let (history, results) = match config.strategy {
            AllocationStrategy::Adaptive => ((remaining * 0.55) as u32, (remaining * 0.45) as u32),
            AllocationStrategy::HistoryFocused => {
                ((remaining * 0.65) as u32, (remaining * 0.35) as u32)
            }
            AllocationStrategy::ResultFocused => {
                let results = (remaining * 0.60) as u32;
                let history = remaining as u32 - results;
                (history, results)
            }
        };

        Self {
            system_prompt,
            response_reserve,
            safety_buffer,
            history,
            results,
        }
    }

    pub fn total(&self) -> u32 {
        self.system_prompt + self.response_reserve + self.safety_buffer + self.history + self.results
    }
}

/// Rough token estimate used when no model-specific tokenizer is wired in
/// (the core never bundles its own tokenizer — see Non-goals).
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() as f64) / 3.5).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: AllocationStrategy) -> BudgetConfig {
        BudgetConfig {
            context_window_tokens: 100_000,
            strategy,
            ..BudgetConfig::default()
        }
    }

    #[test]
    fn adaptive_splits_55_45() {
        let alloc = BudgetAllocation::compute(&config(AllocationStrategy::Adaptive));
        let remaining = alloc.history + alloc.results;
        assert!((alloc.history as f64 / remaining as f64 - 0.55).abs() < 0.01);
    }

    #[test]
    fn history_focused_splits_65_35() {
        let alloc = BudgetAllocation::compute(&config(AllocationStrategy::HistoryFocused));
        let remaining = alloc.history + alloc.results;
        assert!((alloc.history as f64 / remaining as f64 - 0.65).abs() < 0.01);
    }

    #[test]
    fn result_focused_splits_60_results_40_history() {
        let alloc = BudgetAllocation::compute(&config(AllocationStrategy::ResultFocused));
        let remaining = alloc.history + alloc.results;
        assert!((alloc.results as f64 / remaining as f64 - 0.60).abs() < 0.01);
    }

    #[test]
    fn reserved_buckets_match_configured_percentages() {
        let alloc = BudgetAllocation::compute(&config(AllocationStrategy::Adaptive));
        assert_eq!(alloc.system_prompt, 5_000);
        assert_eq!(alloc.response_reserve, 4_000);
        assert_eq!(alloc.safety_buffer, 5_000);
    }

    #[test]
    fn token_estimate_uses_char_ratio() {
        assert_eq!(estimate_tokens(""), 0);
        assert!(estimate_tokens("a") >= 1);
        assert_eq!(estimate_tokens(&"a".repeat(35)), 10);
    }
}
