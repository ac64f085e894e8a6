//! Process-wide index of the account's CloudWatch log groups.
//!
//! Listing every log group in a large account can take several seconds,
//! so the orchestrator loads the full list once at startup (and on
//! demand thereafter) into this shared, `RwLock`-guarded index rather
//! than re-querying CloudWatch on every turn. Tools consult
//! [`LogGroupManager::format_for_prompt`] to ground the model's choice
//! of log group before it ever calls `fetch_logs`.

use cwa_cloudwatch::CloudWatchDataSource;
use cwa_domain::loggroup::LogGroupInfo;
use cwa_domain::trace::TraceEvent;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Above this many log groups, [`LogGroupManager::format_for_prompt`]
/// switches from a full alphabetical list to a categorized summary.
const FULL_LIST_THRESHOLD: usize = 500;
/// Cap on the number of groups shown in a categorized summary.
const SUMMARY_SAMPLE_SIZE: usize = 100;

const KNOWN_PREFIXES: &[&str] = &[
    "/aws/lambda/",
    "/aws/apigateway/",
    "/aws/rds/",
    "/aws/eks/",
    "/ecs/",
    "/aws/elasticbeanstalk/",
    "/aws/codebuild/",
    "/aws/batch/",
    "/aws/kinesisfirehose/",
    "/aws/vendedlogs/",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogGroupManagerState {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

/// The outcome of a [`LogGroupManager::load_all`]/`refresh` call, also
/// handed to every registered update callback.
#[derive(Debug, Clone)]
pub struct LogGroupManagerResult {
    pub success: bool,
    pub log_groups: Vec<LogGroupInfo>,
    pub count: usize,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LogGroupStats {
    pub count: usize,
    pub state: Option<LogGroupManagerState>,
    pub last_refresh: Option<i64>,
    pub total_bytes: u64,
    pub categories: HashMap<String, usize>,
}

struct Inner {
    state: LogGroupManagerState,
    log_groups: Vec<LogGroupInfo>,
    last_refresh: Option<i64>,
}

type UpdateCallback = dyn Fn(&LogGroupManagerResult) + Send + Sync;

/// Shared, thread-safe CloudWatch log-group index.
///
/// Cloned handles (`Arc<LogGroupManager>` or explicit field cloning via
/// [`LogGroupManager::clone`]) all see the same underlying state, the
/// same registry idiom the reference's process manager uses for its
/// session table.
#[derive(Clone)]
pub struct LogGroupManager {
    inner: Arc<RwLock<Inner>>,
    callbacks: Arc<RwLock<Vec<(u64, Arc<UpdateCallback>)>>>,
    next_callback_id: Arc<AtomicU64>,
    datasource: Arc<dyn CloudWatchDataSource>,
}

impl LogGroupManager {
    pub fn new(datasource: Arc<dyn CloudWatchDataSource>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: LogGroupManagerState::Uninitialized,
                log_groups: Vec::new(),
                last_refresh: None,
            })),
            callbacks: Arc::new(RwLock::new(Vec::new())),
            next_callback_id: Arc::new(AtomicU64::new(1)),
            datasource,
        }
    }

    pub fn state(&self) -> LogGroupManagerState {
        self.inner.read().state
    }

    pub fn log_groups(&self) -> Vec<LogGroupInfo> {
        self.inner.read().log_groups.clone()
    }

    pub fn count(&self) -> usize {
        self.inner.read().log_groups.len()
    }

    pub fn last_refresh(&self) -> Option<i64> {
        self.inner.read().last_refresh
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LogGroupManagerState::Ready
    }

    /// Register a callback invoked after every `load_all`/`refresh`,
    /// returning a handle for [`Self::unregister_update_callback`].
    pub fn register_update_callback(&self, callback: Arc<UpdateCallback>) -> u64 {
        let id = self.next_callback_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks.write().push((id, callback));
        id
    }

    pub fn unregister_update_callback(&self, id: u64) {
        self.callbacks.write().retain(|(cb_id, _)| *cb_id != id);
    }

    /// Invoke every registered callback, catching and logging any panic
    /// so one misbehaving subscriber can't break the refresh path.
    fn notify_update(&self, result: &LogGroupManagerResult) {
        for (id, callback) in self.callbacks.read().iter() {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(result)));
            if outcome.is_err() {
                tracing::warn!(callback_id = id, "log group update callback panicked");
            }
        }
    }

    /// Load every log group in the account, replacing the current index.
    /// `now_ms` is the caller-supplied current time (epoch milliseconds),
    /// since this crate never calls the system clock directly.
    pub async fn load_all(&self, now_ms: i64, start_ms: i64) -> LogGroupManagerResult {
        self.inner.write().state = LogGroupManagerState::Loading;

        let on_page = |count: usize| {
            tracing::debug!(count, "log group index page loaded");
        };

        match self.datasource.describe_log_groups_paginated(&on_page).await {
            Ok(groups) => {
                let count = groups.len();
                {
                    let mut inner = self.inner.write();
                    inner.state = LogGroupManagerState::Ready;
                    inner.log_groups = groups.clone();
                    inner.last_refresh = Some(now_ms);
                }
                let duration_ms = (now_ms - start_ms).max(0) as u64;
                TraceEvent::LogGroupsLoaded { count, duration_ms }.emit();
                let result = LogGroupManagerResult {
                    success: true,
                    log_groups: groups,
                    count,
                    error_message: None,
                    duration_ms,
                };
                self.notify_update(&result);
                result
            }
            Err(e) => {
                self.inner.write().state = LogGroupManagerState::Error;
                let result = LogGroupManagerResult {
                    success: false,
                    log_groups: Vec::new(),
                    count: 0,
                    error_message: Some(e.to_string()),
                    duration_ms: (now_ms - start_ms).max(0) as u64,
                };
                self.notify_update(&result);
                result
            }
        }
    }

    pub async fn refresh(&self, now_ms: i64, start_ms: i64) -> LogGroupManagerResult {
        self.load_all(now_ms, start_ms).await
    }

    pub fn get_log_group_names(&self) -> Vec<String> {
        self.inner.read().log_groups.iter().map(|g| g.name.clone()).collect()
    }

    pub fn find_matching_groups(&self, pattern: &str) -> Vec<LogGroupInfo> {
        let pattern_lower = pattern.to_lowercase();
        self.inner
            .read()
            .log_groups
            .iter()
            .filter(|g| g.name.to_lowercase().contains(&pattern_lower))
            .cloned()
            .collect()
    }

    pub fn get_stats(&self) -> LogGroupStats {
        let inner = self.inner.read();
        let total_bytes = inner.log_groups.iter().map(|g| g.stored_bytes).sum();
        let categories = categorize_log_groups(&inner.log_groups)
            .into_iter()
            .map(|(k, v)| (k, v.len()))
            .collect();
        LogGroupStats {
            count: inner.log_groups.len(),
            state: Some(inner.state),
            last_refresh: inner.last_refresh,
            total_bytes,
            categories,
        }
    }

    /// Render the index for inclusion in the system prompt: a tiered
    /// presentation that degrades from a full alphabetical list to a
    /// categorized summary as the account grows.
    pub fn format_for_prompt(&self) -> String {
        let inner = self.inner.read();
        match inner.state {
            LogGroupManagerState::Error => {
                "Log group information is currently unavailable due to an error loading the \
                 index. Tool calls that require a log group name may still succeed, but you \
                 should ask the user to confirm the exact log group name."
                    .to_string()
            }
            LogGroupManagerState::Uninitialized | LogGroupManagerState::Loading => {
                "The log group index has not finished loading yet. Use the list_log_groups \
                 tool directly to discover log groups in the meantime."
                    .to_string()
            }
            LogGroupManagerState::Ready if inner.log_groups.is_empty() => {
                "No CloudWatch log groups were found in this account/region.".to_string()
            }
            LogGroupManagerState::Ready if inner.log_groups.len() <= FULL_LIST_THRESHOLD => {
                format_full_list(&inner.log_groups, inner.last_refresh)
            }
            LogGroupManagerState::Ready => format_summary(&inner.log_groups, inner.last_refresh),
        }
    }
}

fn format_full_list(groups: &[LogGroupInfo], last_refresh: Option<i64>) -> String {
    let mut names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    names.sort_unstable();

    let mut out = format!("Available log groups ({} total", groups.len());
    if let Some(ts) = last_refresh {
        out.push_str(&format!(", last updated {}", cwa_cloudwatch::time_range::time_ago(ts)));
    }
    out.push_str("):\n\n");
    for name in names {
        out.push_str("- ");
        out.push_str(name);
        out.push('\n');
    }
    out.push_str(
        "\nUse fetch_logs with one of the names above, or search_logs with a prefix to \
         search across several at once. The UI sidebar already shows this list and can be \
         refreshed with the /refresh command -- reference the sidebar rather than re-listing \
         names in chat.",
    );
    out
}

fn format_summary(groups: &[LogGroupInfo], last_refresh: Option<i64>) -> String {
    let categories = categorize_log_groups(groups);
    let mut category_counts: Vec<(&String, usize)> =
        categories.iter().map(|(k, v)| (k, v.len())).collect();
    category_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut out = format!(
        "There are {} log groups in this account ({} categories",
        groups.len(),
        categories.len()
    );
    if let Some(ts) = last_refresh {
        out.push_str(&format!(", last updated {}", cwa_cloudwatch::time_range::time_ago(ts)));
    }
    out.push_str("), too many to list individually. Category breakdown:\n\n");
    for (category, count) in &category_counts {
        out.push_str(&format!("- {category}: {count} log groups\n"));
    }

    out.push_str("\nRepresentative sample:\n\n");
    for g in representative_sample(groups, &categories) {
        out.push_str("- ");
        out.push_str(&g.name);
        out.push('\n');
    }

    out.push_str(
        "\nUse list_log_groups with a prefix (e.g. one of the categories above) to narrow \
         down to the log group you need, then fetch_logs or search_logs to query it. The UI \
         sidebar already shows the full list and can be refreshed with the /refresh command \
         -- reference the sidebar rather than re-listing names in chat.",
    );
    out
}

fn categorize_log_groups(groups: &[LogGroupInfo]) -> HashMap<String, Vec<LogGroupInfo>> {
    let mut categories: HashMap<String, Vec<LogGroupInfo>> = HashMap::new();
    for g in groups {
        let category = known_prefix(&g.name).unwrap_or_else(|| derive_category(&g.name));
        categories.entry(category).or_default().push(g.clone());
    }
    categories
}

fn known_prefix(name: &str) -> Option<String> {
    KNOWN_PREFIXES
        .iter()
        .find(|prefix| name.starts_with(*prefix))
        .map(|prefix| prefix.to_string())
}

/// Fallback category for a log group name matching none of the known AWS
/// service prefixes: the first two non-empty path segments, or
/// `"(other)"` for a name with none.
fn derive_category(name: &str) -> String {
    let segments: Vec<&str> = name.split('/').filter(|s| !s.is_empty()).collect();
    match segments.len() {
        0 => "(other)".to_string(),
        1 => format!("/{}/", segments[0]),
        _ => format!("/{}/{}/", segments[0], segments[1]),
    }
}

/// Pick up to [`SUMMARY_SAMPLE_SIZE`] groups proportionally across
/// categories (largest category first), each category's members sorted
/// alphabetically, so the sample represents the account's shape rather
/// than an arbitrary slice.
fn representative_sample(
    groups: &[LogGroupInfo],
    categories: &HashMap<String, Vec<LogGroupInfo>>,
) -> Vec<LogGroupInfo> {
    if groups.len() <= SUMMARY_SAMPLE_SIZE {
        let mut sorted = groups.to_vec();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        return sorted;
    }

    let total = groups.len();
    let mut ordered_categories: Vec<(&String, &Vec<LogGroupInfo>)> = categories.iter().collect();
    ordered_categories.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let mut sample = Vec::new();
    for (_, members) in ordered_categories {
        if sample.len() >= SUMMARY_SAMPLE_SIZE {
            break;
        }
        let allocation = std::cmp::max(1, SUMMARY_SAMPLE_SIZE * members.len() / total);
        let mut sorted_members = members.clone();
        sorted_members.sort_by(|a, b| a.name.cmp(&b.name));
        for member in sorted_members.into_iter().take(allocation) {
            if sample.len() >= SUMMARY_SAMPLE_SIZE {
                break;
            }
            sample.push(member);
        }
    }

    sample.sort_by(|a, b| a.name.cmp(&b.name));
    sample.truncate(SUMMARY_SAMPLE_SIZE);
    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwa_cloudwatch::testing::FakeCloudWatchDataSource;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn group(name: &str) -> LogGroupInfo {
        LogGroupInfo {
            name: name.to_string(),
            created: Some(0),
            stored_bytes: 1024,
            retention_days: Some(14),
        }
    }

    #[tokio::test]
    async fn load_all_transitions_to_ready_and_populates_index() {
        let ds = Arc::new(FakeCloudWatchDataSource::new(vec![
            group("/aws/lambda/fn-a"),
            group("/aws/lambda/fn-b"),
        ]));
        let manager = LogGroupManager::new(ds);
        assert_eq!(manager.state(), LogGroupManagerState::Uninitialized);

        let result = manager.load_all(1_000, 0).await;
        assert!(result.success);
        assert_eq!(result.count, 2);
        assert_eq!(manager.state(), LogGroupManagerState::Ready);
        assert_eq!(manager.count(), 2);
        assert_eq!(manager.last_refresh(), Some(1_000));
    }

    #[tokio::test]
    async fn notifies_registered_callbacks_on_refresh() {
        let ds = Arc::new(FakeCloudWatchDataSource::new(vec![group("/ecs/service-a")]));
        let manager = LogGroupManager::new(ds);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        manager.register_update_callback(Arc::new(move |result: &LogGroupManagerResult| {
            seen_clone.store(result.count, AtomicOrdering::SeqCst);
        }));

        manager.refresh(500, 0).await;
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_callback_is_not_invoked() {
        let ds = Arc::new(FakeCloudWatchDataSource::new(vec![group("/ecs/service-a")]));
        let manager = LogGroupManager::new(ds);

        let called = Arc::new(AtomicUsize::new(0));
        let called_clone = Arc::clone(&called);
        let id = manager.register_update_callback(Arc::new(move |_: &LogGroupManagerResult| {
            called_clone.fetch_add(1, AtomicOrdering::SeqCst);
        }));
        manager.unregister_update_callback(id);

        manager.refresh(500, 0).await;
        assert_eq!(called.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn find_matching_groups_is_case_insensitive_substring() {
        let ds = Arc::new(FakeCloudWatchDataSource::new(vec![
            group("/aws/lambda/Checkout-Service"),
            group("/ecs/billing"),
        ]));
        let manager = LogGroupManager::new(ds);
        manager.load_all(1_000, 0).await;
        let matches = manager.find_matching_groups("checkout");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "/aws/lambda/Checkout-Service");
    }

    #[test]
    fn categorize_groups_known_and_derived_prefixes() {
        let groups = vec![
            group("/aws/lambda/fn-a"),
            group("/aws/lambda/fn-b"),
            group("/ecs/service-a"),
            group("/custom/app-a/worker"),
            group("standalone"),
        ];
        let categories = categorize_log_groups(&groups);
        assert_eq!(categories.get("/aws/lambda/").unwrap().len(), 2);
        assert_eq!(categories.get("/ecs/").unwrap().len(), 1);
        assert_eq!(categories.get("/custom/app-a/").unwrap().len(), 1);
        assert_eq!(categories.get("/standalone/").unwrap().len(), 1);
    }

    #[test]
    fn representative_sample_returns_everything_under_the_cap() {
        let groups: Vec<LogGroupInfo> = (0..10).map(|i| group(&format!("/ecs/service-{i}"))).collect();
        let categories = categorize_log_groups(&groups);
        let sample = representative_sample(&groups, &categories);
        assert_eq!(sample.len(), 10);
    }

    #[test]
    fn representative_sample_caps_at_summary_size() {
        let groups: Vec<LogGroupInfo> =
            (0..1000).map(|i| group(&format!("/aws/lambda/fn-{i:04}"))).collect();
        let categories = categorize_log_groups(&groups);
        let sample = representative_sample(&groups, &categories);
        assert!(sample.len() <= SUMMARY_SAMPLE_SIZE);
    }

    #[tokio::test]
    async fn format_for_prompt_uninitialized() {
        let ds = Arc::new(FakeCloudWatchDataSource::new(vec![]));
        let manager = LogGroupManager::new(ds);
        assert!(manager.format_for_prompt().contains("not finished loading"));
    }

    #[tokio::test]
    async fn format_for_prompt_full_list_under_threshold() {
        let ds = Arc::new(FakeCloudWatchDataSource::new(vec![
            group("/aws/lambda/fn-a"),
            group("/ecs/service-a"),
        ]));
        let manager = LogGroupManager::new(ds);
        manager.load_all(1_000, 0).await;
        let prompt = manager.format_for_prompt();
        assert!(prompt.contains("/aws/lambda/fn-a"));
        assert!(prompt.contains("/ecs/service-a"));
        assert!(prompt.contains("/refresh"));
        assert!(prompt.contains("sidebar"));
    }

    #[tokio::test]
    async fn format_for_prompt_summary_over_threshold() {
        let groups: Vec<LogGroupInfo> =
            (0..600).map(|i| group(&format!("/aws/lambda/fn-{i:04}"))).collect();
        let ds = Arc::new(FakeCloudWatchDataSource::new(groups));
        let manager = LogGroupManager::new(ds);
        manager.load_all(1_000, 0).await;
        let prompt = manager.format_for_prompt();
        assert!(prompt.contains("too many to list individually"));
        assert!(prompt.contains("Representative sample"));
        assert!(prompt.contains("/refresh"));
        assert!(prompt.contains("sidebar"));
    }
}
