//! CloudWatch Logs data access: log group discovery, log event retrieval,
//! and cross-group search, grounded in the reference agent's boto3
//! datasource and re-expressed against the official AWS SDK for Rust.

mod client;
mod datasource;
mod errors;
pub mod testing;
pub mod time_range;

pub use client::build_client;
pub use datasource::AwsCloudWatchDataSource;

use async_trait::async_trait;
use cwa_domain::error::Result;
use cwa_domain::loggroup::LogGroupInfo;
use serde_json::Value;

/// Callback invoked after each page of a full log-group listing, with the
/// running total of groups seen so far.
pub type PageProgress<'a> = &'a (dyn Fn(usize) + Send + Sync);

/// The contract the orchestrator's tools and the log-group index are
/// written against, so neither depends on the AWS SDK directly.
#[async_trait]
pub trait CloudWatchDataSource: Send + Sync {
    /// List log groups, optionally filtered by name prefix.
    async fn list_log_groups(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<LogGroupInfo>>;

    /// Fetch log events from a single log group within a time range,
    /// optionally filtered by a CloudWatch filter pattern and/or a log
    /// stream name prefix.
    async fn fetch_logs(
        &self,
        log_group: &str,
        start_time: i64,
        end_time: i64,
        filter_pattern: Option<&str>,
        limit: usize,
        log_stream_prefix: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// Search across every log group matching any of `log_group_patterns`
    /// for `search_pattern`, aggregating and sorting results by recency.
    async fn search_logs(
        &self,
        log_group_patterns: &[String],
        search_pattern: &str,
        start_time: i64,
        end_time: i64,
        limit: usize,
    ) -> Result<Vec<Value>>;

    /// List every log group in the account, unbounded, invoking
    /// `on_page` with the running count after each page. Used only by
    /// the log-group index's full-pagination load.
    async fn describe_log_groups_paginated(&self, on_page: PageProgress<'_>) -> Result<Vec<LogGroupInfo>>;

    /// Verify credentials and connectivity without fetching real data.
    async fn test_connection(&self) -> Result<()>;
}
