use crate::config::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide settings that aren't per-session tunables: where cache
/// files live and which AWS credentials/region to use for CloudWatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "d_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub aws_profile: Option<String>,
    /// Explicit static credentials, checked before `aws_profile` and the
    /// IAM default provider chain.
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_dir: d_cache_dir(),
            aws_region: None,
            aws_profile: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            provider: ProviderConfig::default(),
        }
    }
}

fn d_cache_dir() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache")).join("cwa")
}
