use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    #[serde(default = "d_enabled")]
    pub enabled: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            enabled: d_enabled(),
        }
    }
}

fn d_enabled() -> bool {
    true
}
