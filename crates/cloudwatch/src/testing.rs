//! An in-memory [`CloudWatchDataSource`] for exercising tools, the
//! orchestrator, and the log-group index without talking to AWS.

use crate::{CloudWatchDataSource, PageProgress};
use async_trait::async_trait;
use cwa_domain::error::Result;
use cwa_domain::loggroup::LogGroupInfo;
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Default)]
pub struct FakeCloudWatchDataSource {
    pub log_groups: Vec<LogGroupInfo>,
    /// log_group name -> events, pre-sorted however the test wants.
    pub events: Mutex<std::collections::HashMap<String, Vec<Value>>>,
}

impl FakeCloudWatchDataSource {
    pub fn new(log_groups: Vec<LogGroupInfo>) -> Self {
        Self {
            log_groups,
            events: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn with_events(mut self, log_group: impl Into<String>, events: Vec<Value>) -> Self {
        self.events.get_mut().insert(log_group.into(), events);
        self
    }
}

#[async_trait]
impl CloudWatchDataSource for FakeCloudWatchDataSource {
    async fn list_log_groups(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<LogGroupInfo>> {
        Ok(self
            .log_groups
            .iter()
            .filter(|g| prefix.map(|p| g.name.starts_with(p)).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_logs(
        &self,
        log_group: &str,
        start_time: i64,
        end_time: i64,
        filter_pattern: Option<&str>,
        limit: usize,
        _log_stream_prefix: Option<&str>,
    ) -> Result<Vec<Value>> {
        let events = self.events.lock();
        let matching: Vec<Value> = events
            .get(log_group)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|e| {
                let ts = e.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
                ts >= start_time && ts <= end_time
            })
            .filter(|e| {
                filter_pattern
                    .map(|pat| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(|m| m.contains(pat))
                            .unwrap_or(false)
                    })
                    .unwrap_or(true)
            })
            .take(limit)
            .collect();
        Ok(matching)
    }

    async fn search_logs(
        &self,
        log_group_patterns: &[String],
        search_pattern: &str,
        start_time: i64,
        end_time: i64,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        for pattern in log_group_patterns {
            let groups = self.list_log_groups(Some(pattern), 100).await?;
            for g in groups {
                let events = self
                    .fetch_logs(&g.name, start_time, end_time, Some(search_pattern), limit, None)
                    .await?;
                all.extend(events);
            }
        }
        all.sort_by(|a, b| {
            let ts_a = a.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
            let ts_b = b.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
            ts_b.cmp(&ts_a)
        });
        all.truncate(limit);
        Ok(all)
    }

    async fn describe_log_groups_paginated(&self, on_page: PageProgress<'_>) -> Result<Vec<LogGroupInfo>> {
        on_page(self.log_groups.len());
        Ok(self.log_groups.clone())
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }
}
