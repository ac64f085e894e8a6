use serde::{Deserialize, Serialize};

/// Lightweight representation of a CloudWatch log group — only what the
/// index and the fetch/search tools actually need, to keep the in-memory
/// index cheap even for accounts with tens of thousands of groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogGroupInfo {
    pub name: String,
    /// Epoch milliseconds.
    pub created: Option<i64>,
    #[serde(default)]
    pub stored_bytes: u64,
    pub retention_days: Option<i32>,
}
