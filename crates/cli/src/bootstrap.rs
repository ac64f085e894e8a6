//! Assembles the agent runtime: loads configuration, opens the two
//! on-disk caches, builds the CloudWatch datasource and LLM provider,
//! registers the tool set, and wires everything into an [`Orchestrator`].

use std::sync::Arc;

use anyhow::Context;
use cwa_cloudwatch::{build_client, AwsCloudWatchDataSource, CloudWatchDataSource};
use cwa_domain::config::Config;
use cwa_loggroups::LogGroupManager;
use cwa_orchestrator::Orchestrator;
use cwa_providers::{LlmProvider, OpenAiCompatProvider};
use cwa_querycache::QueryCache;
use cwa_resultcache::ResultCache;
use cwa_sanitizer::LogSanitizer;
use cwa_tools::{FetchCachedResultChunkTool, FetchLogsTool, ListLogGroupsTool, SearchLogsTool, ToolRegistry};

/// Everything the REPL needs once the runtime is up.
pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub log_groups: Arc<LogGroupManager>,
}

/// Build the full runtime from a loaded [`Config`].
///
/// Opens `cache.db`/`result_cache.db` under `config.runtime.cache_dir`
/// (creating the directory if needed), constructs the CloudWatch
/// datasource and LLM provider from the same config, registers the
/// four built-in tools, and performs the initial log-group load before
/// handing back the assembled [`Orchestrator`].
pub async fn build_app(config: Config) -> anyhow::Result<App> {
    std::fs::create_dir_all(&config.runtime.cache_dir)
        .with_context(|| format!("creating cache directory {}", config.runtime.cache_dir.display()))?;

    let query_cache = Arc::new(
        QueryCache::open(config.runtime.cache_dir.join("cache.db"), config.query_cache.clone())
            .context("opening query cache")?,
    );
    let result_cache = Arc::new(
        ResultCache::open(
            config.runtime.cache_dir.join("result_cache.db"),
            config.result_cache.clone(),
        )
        .context("opening result cache")?,
    );
    let sanitizer = Arc::new(LogSanitizer::new(config.sanitizer.enabled, Vec::new()));

    let aws_client = build_client(&config.runtime).await;
    let datasource: Arc<dyn CloudWatchDataSource> =
        Arc::new(AwsCloudWatchDataSource::from_client(aws_client));

    let log_groups = Arc::new(LogGroupManager::new(datasource.clone()));
    let now = chrono::Utc::now().timestamp_millis();
    let result = log_groups.load_all(now, now).await;
    if !result.success {
        tracing::warn!(
            error = result.error_message.as_deref().unwrap_or("unknown"),
            "initial log group load failed; continuing with an empty index"
        );
    }

    let mut tools = ToolRegistry::new();
    tools.register(ListLogGroupsTool::new(datasource.clone(), Some(query_cache.clone())));
    tools.register(FetchLogsTool::new(
        datasource.clone(),
        sanitizer.clone(),
        Some(query_cache.clone()),
    ));
    tools.register(SearchLogsTool::new(datasource, sanitizer, Some(query_cache)));
    tools.register(FetchCachedResultChunkTool::new(result_cache.clone()));

    let llm: Arc<dyn LlmProvider> =
        Arc::new(OpenAiCompatProvider::from_config(&config.runtime.provider).context("building LLM provider")?);

    let orchestrator = Arc::new(Orchestrator::new(
        llm,
        Arc::new(tools),
        config.session,
        config.budget,
        Some(result_cache),
        Some(log_groups.clone()),
    ));

    Ok(App { orchestrator, log_groups })
}
