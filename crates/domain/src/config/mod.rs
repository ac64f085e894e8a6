mod budget;
mod cache;
mod provider;
mod runtime;
mod sanitizer;
mod session;

pub use budget::*;
pub use cache::*;
pub use provider::*;
pub use runtime::*;
pub use sanitizer::*;
pub use session::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub query_cache: QueryCacheConfig,
    #[serde(default)]
    pub result_cache: ResultCacheConfig,
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load config from a TOML file, falling back to defaults for any
    /// section the file omits. Environment variables of the form
    /// `CWA_<SECTION>_<FIELD>` override the file value after parsing,
    /// mirroring the layered precedence used by the reference gateway.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut cfg: Config =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CWA_SESSION_MAX_TOOL_ITERATIONS") {
            if let Ok(n) = v.parse() {
                self.session.max_tool_iterations = n;
            }
        }
        if let Ok(v) = std::env::var("CWA_SESSION_PII_SANITIZATION_ENABLED") {
            if let Ok(b) = v.parse() {
                self.session.pii_sanitization_enabled = b;
            }
        }
        if let Ok(v) = std::env::var("CWA_SANITIZER_ENABLED") {
            if let Ok(b) = v.parse() {
                self.sanitizer.enabled = b;
            }
        }
        if let Ok(v) = std::env::var("AWS_REGION") {
            self.runtime.aws_region = Some(v);
        }
        if let Ok(v) = std::env::var("AWS_PROFILE") {
            self.runtime.aws_profile = Some(v);
        }
        if let Ok(v) = std::env::var("AWS_ACCESS_KEY_ID") {
            self.runtime.aws_access_key_id = Some(v);
        }
        if let Ok(v) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            self.runtime.aws_secret_access_key = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = Config::default();
        assert_eq!(cfg.session.max_tool_iterations, 10);
        assert_eq!(cfg.budget.preserve_recent, 4);
        assert!(cfg.sanitizer.enabled);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = Config::load("/nonexistent/cwa-config.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
