use crate::client::build_client;
use crate::errors::map_aws_error;
use crate::{CloudWatchDataSource, PageProgress};
use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::types::{FilteredLogEvent, LogGroup};
use aws_sdk_cloudwatchlogs::Client;
use cwa_domain::config::RuntimeConfig;
use cwa_domain::error::{Error, Result};
use cwa_domain::loggroup::LogGroupInfo;
use serde_json::{json, Value};
use std::cmp::{max, min};
use std::collections::HashSet;

/// CloudWatch Logs hard-caps a single `FilterLogEvents` page request at
/// this many events; anything higher in a tool call's `limit` is clamped.
const MAX_EVENTS_PER_REQUEST: usize = 10_000;
const MIN_PER_GROUP_LIMIT: usize = 10;
const GROUP_RESOLUTION_LIMIT: usize = 100;

/// The production data source: talks to real CloudWatch Logs via the AWS
/// SDK, with retry and credential policy configured in [`crate::client`].
pub struct AwsCloudWatchDataSource {
    client: Client,
}

impl AwsCloudWatchDataSource {
    pub async fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: build_client(cfg).await,
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudWatchDataSource for AwsCloudWatchDataSource {
    async fn list_log_groups(&self, prefix: Option<&str>, limit: usize) -> Result<Vec<LogGroupInfo>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self.client.describe_log_groups();
            if let Some(p) = prefix {
                req = req.log_group_name_prefix(p);
            }
            if let Some(t) = &next_token {
                req = req.next_token(t);
            }
            let output = req
                .send()
                .await
                .map_err(|e| map_aws_error("list_log_groups", e, false))?;

            for lg in output.log_groups() {
                groups.push(to_log_group_info(lg));
                if groups.len() >= limit {
                    return Ok(groups);
                }
            }

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(groups)
    }

    async fn fetch_logs(
        &self,
        log_group: &str,
        start_time: i64,
        end_time: i64,
        filter_pattern: Option<&str>,
        limit: usize,
        log_stream_prefix: Option<&str>,
    ) -> Result<Vec<Value>> {
        let capped_limit = min(limit, MAX_EVENTS_PER_REQUEST);
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .filter_log_events()
                .log_group_name(log_group)
                .start_time(start_time)
                .end_time(end_time);
            if let Some(fp) = filter_pattern {
                req = req.filter_pattern(fp);
            }
            if let Some(sp) = log_stream_prefix {
                req = req.log_stream_name_prefix(sp);
            }
            if let Some(t) = &next_token {
                req = req.next_token(t);
            }

            let output = req
                .send()
                .await
                .map_err(|e| map_aws_error("fetch_logs", e, true))?;

            for event in output.events() {
                events.push(filtered_event_to_json(log_group, event));
                if events.len() >= capped_limit {
                    return Ok(events);
                }
            }

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(events)
    }

    async fn search_logs(
        &self,
        log_group_patterns: &[String],
        search_pattern: &str,
        start_time: i64,
        end_time: i64,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut group_names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for pattern in log_group_patterns {
            let matches = self
                .list_log_groups(Some(pattern), GROUP_RESOLUTION_LIMIT)
                .await?;
            for g in matches {
                if seen.insert(g.name.clone()) {
                    group_names.push(g.name);
                }
            }
        }

        if group_names.is_empty() {
            return Ok(Vec::new());
        }

        let per_group_limit = max(limit / group_names.len(), MIN_PER_GROUP_LIMIT);

        let mut all_events = Vec::new();
        for group in &group_names {
            match self
                .fetch_logs(group, start_time, end_time, Some(search_pattern), per_group_limit, None)
                .await
            {
                Ok(events) => all_events.extend(events),
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        all_events.sort_by(|a, b| {
            let ts_a = a.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
            let ts_b = b.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
            ts_b.cmp(&ts_a)
        });
        all_events.truncate(limit);

        Ok(all_events)
    }

    async fn describe_log_groups_paginated(&self, on_page: PageProgress<'_>) -> Result<Vec<LogGroupInfo>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self.client.describe_log_groups();
            if let Some(t) = &next_token {
                req = req.next_token(t);
            }
            let output = req
                .send()
                .await
                .map_err(|e| map_aws_error("describe_log_groups_paginated", e, false))?;

            for lg in output.log_groups() {
                groups.push(to_log_group_info(lg));
            }
            on_page(groups.len());

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(groups)
    }

    async fn test_connection(&self) -> Result<()> {
        self.client
            .describe_log_groups()
            .limit(1)
            .send()
            .await
            .map_err(|e| map_aws_error("test_connection", e, false))?;
        Ok(())
    }
}

fn to_log_group_info(lg: &LogGroup) -> LogGroupInfo {
    LogGroupInfo {
        name: lg.log_group_name().unwrap_or_default().to_string(),
        created: lg.creation_time(),
        stored_bytes: lg.stored_bytes().unwrap_or(0).max(0) as u64,
        retention_days: lg.retention_in_days(),
    }
}

fn filtered_event_to_json(log_group: &str, event: &FilteredLogEvent) -> Value {
    json!({
        "log_group": log_group,
        "log_stream": event.log_stream_name().unwrap_or_default(),
        "timestamp": event.timestamp().unwrap_or(0),
        "message": event.message().unwrap_or_default(),
        "ingestion_time": event.ingestion_time(),
        "event_id": event.event_id(),
    })
}
