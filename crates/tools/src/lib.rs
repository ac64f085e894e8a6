//! Built-in tools the orchestrator exposes to the model: CloudWatch log
//! discovery/fetch/search, and the cached-result pager that lets it page
//! back through results too large to keep in the conversation.

pub mod base;
pub mod cloudwatch_tools;
pub mod fetch_cached_result;

pub use base::{Tool, ToolRegistry};
pub use cloudwatch_tools::{FetchLogsTool, ListLogGroupsTool, SearchLogsTool};
pub use fetch_cached_result::FetchCachedResultChunkTool;
