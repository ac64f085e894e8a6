use serde::{Deserialize, Serialize};

/// Configuration for the single LLM provider this agent talks to.
///
/// Unlike the reference gateway's multi-provider router, this agent
/// drives one chat model at a time — `kind` only needs to distinguish
/// wire formats, not pick among a fleet of adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    OpenaiCompat,
    AzureOpenai,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: "default".into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            default_model: None,
        }
    }
}
