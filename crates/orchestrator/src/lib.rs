//! Coordinates a single chat session: builds the outgoing message list
//! each turn, drives the tool-calling loop against an [`LlmProvider`],
//! diverts oversized tool results to the result cache, prunes history
//! under the context budget, and nudges the model back toward action
//! when it states an intention without executing it.

mod self_direction;
mod system_prompt;
mod types;

pub use self_direction::{detect_intent, detect_premature_giving_up, DetectedIntent, IntentType};
pub use types::{ContextNotification, NotificationSeverity, RetryCondition, ToolCallRecord, ToolCallStatus};

use chrono::Utc;
use cwa_budget::{estimate_tokens, BudgetConfig, ContextBudgetTracker};
use cwa_domain::config::SessionConfig;
use cwa_domain::error::Result;
use cwa_domain::tool::{ContentPart, Message, MessageContent, Role};
use cwa_domain::trace::TraceEvent;
use cwa_loggroups::LogGroupManager;
use cwa_providers::{ChatRequest, LlmProvider};
use cwa_resultcache::ResultCache;
use cwa_tools::ToolRegistry;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

type ToolListener = Arc<dyn Fn(&ToolCallRecord) + Send + Sync>;
type NotificationCallback = Arc<dyn Fn(&ContextNotification) + Send + Sync>;

pub struct Orchestrator {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    result_cache: Option<Arc<ResultCache>>,
    log_groups: Option<Arc<LogGroupManager>>,
    session: SessionConfig,
    budget: Mutex<ContextBudgetTracker>,
    history: Mutex<Vec<Message>>,
    tool_listeners: Mutex<Vec<ToolListener>>,
    notification_callback: Mutex<Option<NotificationCallback>>,
    pending_injections: Mutex<VecDeque<String>>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        session: SessionConfig,
        budget_config: BudgetConfig,
        result_cache: Option<Arc<ResultCache>>,
        log_groups: Option<Arc<LogGroupManager>>,
    ) -> Self {
        Self {
            llm,
            tools,
            result_cache,
            log_groups,
            session,
            budget: Mutex::new(ContextBudgetTracker::new(budget_config)),
            history: Mutex::new(Vec::new()),
            tool_listeners: Mutex::new(Vec::new()),
            notification_callback: Mutex::new(None),
            pending_injections: Mutex::new(VecDeque::new()),
        }
    }

    pub fn register_tool_listener(&self, listener: impl Fn(&ToolCallRecord) + Send + Sync + 'static) {
        self.tool_listeners.lock().push(Arc::new(listener));
    }

    pub fn set_context_notification_callback(&self, callback: impl Fn(&ContextNotification) + Send + Sync + 'static) {
        *self.notification_callback.lock() = Some(Arc::new(callback));
    }

    pub fn inject_context_update(&self, text: impl Into<String>) {
        self.pending_injections.lock().push_back(text.into());
    }

    /// Queue a one-shot system injection that wins over any other
    /// pending injection: it's surfaced on the very next turn, ahead of
    /// anything queued via [`Self::inject_context_update`].
    fn inject_priority_context_update(&self, text: impl Into<String>) {
        self.pending_injections.lock().push_front(text.into());
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
        self.budget.lock().reset();
    }

    pub fn get_history(&self) -> Vec<Message> {
        self.history.lock().clone()
    }

    /// Process a user message through the LLM with tool execution,
    /// returning the final assistant text.
    pub async fn chat(&self, user_message: &str) -> Result<String> {
        self.run_turn(user_message).await
    }

    /// Process a user message and stream the final response back one
    /// character at a time, the way the reference implementation
    /// simulates streaming: tool-call phases run to completion
    /// non-streaming, then the finished text is emitted incrementally.
    /// For MVP, true incremental streaming with interleaved tool calls
    /// is out of scope; this gives callers a streaming UI effect
    /// without reducing latency to the first token.
    pub fn chat_stream(self: &Arc<Self>, user_message: String) -> tokio::sync::mpsc::Receiver<Result<String>> {
        let (tx, rx) = tokio::sync::mpsc::channel(256);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.run_turn(&user_message).await {
                Ok(text) => {
                    for ch in text.chars() {
                        if tx.send(Ok(ch.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });
        rx
    }

    fn notify(&self, notification: ContextNotification) {
        if let Some(cb) = self.notification_callback.lock().as_ref() {
            cb(&notification);
        }
    }

    fn notify_tool(&self, record: &ToolCallRecord) {
        for listener in self.tool_listeners.lock().iter() {
            listener(record);
        }
    }

    /// Push a message onto both the history and the budget tracker.
    /// System-role messages are always synthetic guidance injected by
    /// this orchestrator (self-direction nudges, retry conditions), so
    /// they're marked important and protected from pruning.
    fn push_message(&self, msg: Message) {
        let (role, important) = match msg.role {
            Role::System => ("system", true),
            Role::User => ("user", false),
            Role::Assistant => ("assistant", false),
            Role::Tool => ("tool", false),
        };
        let text = msg.content.extract_all_text();
        self.budget.lock().add_message(role, text, important);
        self.history.lock().push(msg);
    }

    async fn run_turn(&self, user_message: &str) -> Result<String> {
        TraceEvent::TurnStarted { user_message_chars: user_message.chars().count() }.emit();
        self.push_message(Message::user(user_message));
        self.maybe_prune();

        let now = Utc::now();
        let system_text = self.build_system_prompt(now);
        self.budget.lock().set_system_prompt(&system_text);

        let mut pending_injection = self.pending_injections.lock().pop_front();
        let mut used_conditions: HashSet<RetryCondition> = HashSet::new();
        let mut retry_attempts = 0usize;
        let max_iterations = self.session.clamped_max_tool_iterations();

        let mut iteration = 0usize;
        loop {
            if iteration >= max_iterations {
                let msg = format!(
                    "Maximum tool iterations ({max_iterations}) exceeded. The conversation may be stuck in a loop."
                );
                self.push_message(Message::assistant(&msg));
                return Ok(msg);
            }
            iteration += 1;

            let mut outgoing = vec![Message::system(&system_text)];
            if let Some(injection) = pending_injection.take() {
                outgoing.push(Message::system(injection));
            }
            outgoing.extend(self.history.lock().iter().cloned());

            let request = ChatRequest {
                messages: outgoing,
                tools: self.tools.definitions(),
                ..ChatRequest::default()
            };

            let response = match self.llm.chat(&request).await {
                Ok(r) => r,
                Err(e) => {
                    let msg = format!("LLM provider error: {e}");
                    self.push_message(Message::assistant(&msg));
                    return Ok(msg);
                }
            };

            if response.tool_calls.is_empty() {
                let text = response.content.clone();
                if self.session.intent_detection_enabled {
                    if let Some(condition) = self.detect_text_nudge(&text) {
                        let nudged = retry_attempts < self.session.max_retry_attempts && used_conditions.insert(condition);
                        TraceEvent::IntentDetected { intent: format!("{condition:?}"), nudged }.emit();
                        if nudged {
                            retry_attempts += 1;
                            self.push_message(Message::assistant(&text));
                            self.push_message(Message::system(condition.guidance(self.session.time_expansion_factor)));
                            tokio::time::sleep(backoff_delay(iteration)).await;
                            continue;
                        }
                    }
                }
                if text.is_empty() {
                    let msg = "Received empty response from LLM".to_string();
                    self.push_message(Message::assistant(&msg));
                    return Ok(msg);
                }
                self.push_message(Message::assistant(&text));
                return Ok(text);
            }

            let assistant_parts: Vec<ContentPart> = {
                let mut parts = Vec::new();
                if !response.content.is_empty() {
                    parts.push(ContentPart::Text { text: response.content.clone() });
                }
                for call in &response.tool_calls {
                    parts.push(ContentPart::ToolUse {
                        id: call.call_id.clone(),
                        name: call.tool_name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                parts
            };
            self.push_message(Message { role: Role::Assistant, content: MessageContent::Parts(assistant_parts) });

            let mut any_empty = false;
            let mut any_not_found = false;
            for call in &response.tool_calls {
                let result = self.dispatch_tool_call(&call.call_id, &call.tool_name, call.arguments.clone()).await;
                if is_empty_result(&result) {
                    any_empty = true;
                }
                if is_not_found_result(&result) {
                    any_not_found = true;
                }
                let content = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
                self.push_message(Message::tool_result(call.call_id.clone(), content));
            }

            if self.session.auto_retry_enabled && retry_attempts < self.session.max_retry_attempts {
                let condition = if any_not_found {
                    Some(RetryCondition::LogGroupNotFound)
                } else if any_empty {
                    Some(RetryCondition::EmptyLogs)
                } else {
                    None
                };
                if let Some(condition) = condition {
                    if used_conditions.insert(condition) {
                        retry_attempts += 1;
                        self.push_message(Message::system(condition.guidance(self.session.time_expansion_factor)));
                    }
                }
            }

            tokio::time::sleep(backoff_delay(iteration)).await;
        }
    }

    fn maybe_prune(&self) {
        if !self.session.enable_history_pruning {
            return;
        }
        let (indices, tokens_freed) = {
            let mut budget = self.budget.lock();
            if !budget.should_prune_history() {
                return;
            }
            budget.prune_messages_indexed()
        };
        if !indices.is_empty() {
            let mut history = self.history.lock();
            for &idx in indices.iter().rev() {
                if idx < history.len() {
                    history.remove(idx);
                }
            }
            drop(history);
            TraceEvent::BudgetPruned { messages_removed: indices.len(), tokens_freed }.emit();
            self.notify(ContextNotification::info(format!(
                "pruned {} older message(s) to stay within the context budget",
                indices.len()
            )));
        }
    }

    fn build_system_prompt(&self, now: chrono::DateTime<Utc>) -> String {
        let mut prompt = system_prompt::render(now);
        if let Some(manager) = &self.log_groups {
            prompt.push_str("\n\n");
            prompt.push_str(&manager.format_for_prompt());
        }
        prompt
    }

    fn detect_text_nudge(&self, text: &str) -> Option<RetryCondition> {
        if let Some(intent) = self_direction::detect_intent(text) {
            return Some(match intent.intent_type {
                IntentType::SearchLogs => RetryCondition::IntentSearchLogs,
                IntentType::ListLogGroups => RetryCondition::IntentListLogGroups,
                IntentType::ExpandTime => RetryCondition::IntentExpandTime,
                IntentType::ChangeFilter => RetryCondition::IntentChangeFilter,
                IntentType::Analyze => return None,
            });
        }
        if self_direction::detect_premature_giving_up(text) {
            return Some(RetryCondition::EmptyLogs);
        }
        None
    }

    async fn dispatch_tool_call(&self, call_id: &str, tool_name: &str, arguments: Value) -> Value {
        TraceEvent::ToolCallDispatched { tool_name: tool_name.to_string(), call_id: call_id.to_string() }.emit();
        self.notify_tool(&ToolCallRecord {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            status: ToolCallStatus::Pending,
            arguments: Some(arguments.clone()),
            result: None,
            error: None,
        });
        self.notify_tool(&ToolCallRecord {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            status: ToolCallStatus::Running,
            arguments: Some(arguments.clone()),
            result: None,
            error: None,
        });

        match self.tools.execute(tool_name, arguments.clone()).await {
            Ok(mut result) => {
                let final_result = self.maybe_cache_result(tool_name, &arguments, result.clone());
                if let Some(cached) = final_result {
                    result = cached;
                }
                TraceEvent::ToolCallCompleted {
                    tool_name: tool_name.to_string(),
                    call_id: call_id.to_string(),
                    is_error: false,
                }
                .emit();
                self.notify_tool(&ToolCallRecord {
                    call_id: call_id.to_string(),
                    tool_name: tool_name.to_string(),
                    status: ToolCallStatus::Success,
                    arguments: Some(arguments),
                    result: Some(result.clone()),
                    error: None,
                });
                result
            }
            Err(e) => {
                let message = e.to_string();
                TraceEvent::ToolCallCompleted {
                    tool_name: tool_name.to_string(),
                    call_id: call_id.to_string(),
                    is_error: true,
                }
                .emit();
                self.notify_tool(&ToolCallRecord {
                    call_id: call_id.to_string(),
                    tool_name: tool_name.to_string(),
                    status: ToolCallStatus::Error,
                    arguments: Some(arguments),
                    result: None,
                    error: Some(message.clone()),
                });
                serde_json::json!({"success": false, "error": format!("Tool execution failed: {message}")})
            }
        }
    }

    /// Divert an oversized tool result to the result cache, returning
    /// its replacement summary envelope, or `None` if the result should
    /// be inlined as-is.
    fn maybe_cache_result(&self, tool_name: &str, arguments: &Value, result: Value) -> Option<Value> {
        let payload = serde_json::to_string(&result).unwrap_or_default();
        let tokens = estimate_tokens(&payload);
        let threshold = self.session.cache_large_results_threshold;

        let should_cache = {
            let mut budget = self.budget.lock();
            let should_cache = self.session.enable_result_caching && budget.should_cache_result(tokens, threshold);
            if !should_cache {
                budget.record_result_tokens(tokens);
            }
            should_cache
        };

        if !should_cache {
            return None;
        }
        let Some(cache) = &self.result_cache else {
            self.budget.lock().record_result_tokens(tokens);
            return None;
        };

        let now = Utc::now().timestamp();
        match cache.cache_result(tool_name, arguments, &result, now) {
            Ok(summary) => {
                TraceEvent::ResultCached {
                    cache_id: summary.cache_id.clone(),
                    total_events: summary.total_events,
                }
                .emit();
                self.notify(ContextNotification::info(format!(
                    "cached {} events from {tool_name} (cache_id {})",
                    summary.total_events, summary.cache_id
                )));
                if self.session.enable_auto_fetch_guidance {
                    self.inject_priority_context_update(format!(
                        "The result of {tool_name} was too large to include directly and was \
                         cached as '{}'. Call fetch_cached_result_chunk(cache_id=\"{}\", offset=0, \
                         limit={}) to retrieve it.",
                        summary.cache_id, summary.cache_id, self.session.initial_chunk_size
                    ));
                }
                Some(summary.to_context_dict(now))
            }
            Err(e) => {
                tracing::warn!(error = %e, tool_name, "failed to cache oversized tool result");
                self.budget.lock().record_result_tokens(tokens);
                None
            }
        }
    }
}

/// Exponential backoff between tool-calling iterations: 0.5s, 1.0s,
/// 2.0s, then doubling again, capped at 30s.
fn backoff_delay(iteration: usize) -> Duration {
    let secs = match iteration {
        1 => 0.5,
        2 => 1.0,
        3 => 2.0,
        n => (2.0 * 2f64.powi((n as i32) - 2)).min(30.0),
    };
    Duration::from_secs_f64(secs)
}

fn is_empty_result(result: &Value) -> bool {
    result
        .get("count")
        .and_then(Value::as_u64)
        .map(|c| c == 0)
        .unwrap_or(false)
}

fn is_not_found_result(result: &Value) -> bool {
    if result.get("success").and_then(Value::as_bool) == Some(true) {
        return false;
    }
    result
        .get("error")
        .and_then(Value::as_str)
        .map(|e| e.to_lowercase().contains("not found") || e.to_lowercase().contains("resourcenotfound"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cwa_domain::capability::LlmCapabilities;
    use cwa_domain::error::Error;
    use cwa_domain::stream::{BoxStream, StreamEvent};
    use cwa_providers::{ChatResponse, EmbeddingsRequest, EmbeddingsResponse};
    use cwa_tools::Tool;
    use std::collections::VecDeque;

    struct FakeLlmProvider {
        capabilities: LlmCapabilities,
        responses: Mutex<VecDeque<ChatResponse>>,
    }

    impl FakeLlmProvider {
        fn with_responses(responses: Vec<ChatResponse>) -> Self {
            Self {
                capabilities: LlmCapabilities::default(),
                responses: Mutex::new(responses.into()),
            }
        }
    }

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            content: text.to_string(),
            tool_calls: vec![],
            usage: None,
            model: "fake-model".into(),
            finish_reason: Some("stop".into()),
        }
    }

    fn tool_call_response(call_id: &str, tool_name: &str, args: Value) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            tool_calls: vec![cwa_domain::tool::ToolCall {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                arguments: args,
            }],
            usage: None,
            model: "fake-model".into(),
            finish_reason: Some("tool_calls".into()),
        }
    }

    #[async_trait]
    impl LlmProvider for FakeLlmProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| Error::Other("no more fake responses queued".into()))
        }

        async fn chat_stream(&self, _req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            Ok(Box::pin(futures_util::stream::empty()))
        }

        async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
            Ok(EmbeddingsResponse { embeddings: vec![] })
        }

        fn capabilities(&self) -> &LlmCapabilities {
            &self.capabilities
        }

        fn provider_id(&self) -> &str {
            "fake"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its arguments"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, args: Value) -> Result<Value> {
            Ok(serde_json::json!({"success": true, "count": 1, "echoed": args}))
        }
    }

    struct EmptyResultTool;

    #[async_trait]
    impl Tool for EmptyResultTool {
        fn name(&self) -> &str {
            "fetch_logs"
        }
        fn description(&self) -> &str {
            "returns no events"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> Result<Value> {
            Ok(serde_json::json!({"success": true, "count": 0, "events": []}))
        }
    }

    fn registry_with(tool: impl Tool + 'static) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        Arc::new(registry)
    }

    fn orchestrator(llm: FakeLlmProvider, tools: Arc<ToolRegistry>) -> Orchestrator {
        Orchestrator::new(Arc::new(llm), tools, SessionConfig::default(), BudgetConfig::default(), None, None)
    }

    #[tokio::test]
    async fn plain_text_response_ends_the_turn() {
        let llm = FakeLlmProvider::with_responses(vec![text_response("All systems normal.")]);
        let orch = orchestrator(llm, registry_with(EchoTool));
        let reply = orch.chat("how are things?").await.unwrap();
        assert_eq!(reply, "All systems normal.");
        assert_eq!(orch.get_history().len(), 2);
    }

    #[tokio::test]
    async fn tool_call_is_dispatched_and_fed_back_to_the_model() {
        let llm = FakeLlmProvider::with_responses(vec![
            tool_call_response("call-1", "echo", serde_json::json!({"x": 1})),
            text_response("Done."),
        ]);
        let orch = orchestrator(llm, registry_with(EchoTool));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        orch.register_tool_listener(move |record| {
            seen_clone.lock().push(record.status);
        });

        let reply = orch.chat("echo please").await.unwrap();
        assert_eq!(reply, "Done.");
        let statuses = seen.lock().clone();
        assert!(statuses.contains(&ToolCallStatus::Success));
    }

    #[tokio::test]
    async fn empty_tool_result_triggers_one_retry_nudge() {
        let llm = FakeLlmProvider::with_responses(vec![
            tool_call_response("call-1", "fetch_logs", serde_json::json!({"log_group": "/g"})),
            text_response("No events in that window."),
        ]);
        let orch = orchestrator(llm, registry_with(EmptyResultTool));
        let reply = orch.chat("check for errors").await.unwrap();
        assert_eq!(reply, "No events in that window.");
        let history = orch.get_history();
        let has_guidance = history.iter().any(|m| {
            m.role == Role::System && m.content.extract_all_text().contains("Expand the time range")
        });
        assert!(has_guidance);
    }

    #[tokio::test]
    async fn stated_intent_without_tool_call_is_nudged_then_eventually_returns() {
        let llm = FakeLlmProvider::with_responses(vec![
            text_response("Let me search the logs for that."),
            text_response("Found nothing unusual."),
        ]);
        let orch = orchestrator(llm, registry_with(EchoTool));
        let reply = orch.chat("anything weird happening?").await.unwrap();
        assert_eq!(reply, "Found nothing unusual.");
    }

    #[tokio::test]
    async fn iteration_ceiling_ends_the_turn_with_a_terminal_message() {
        let mut session = SessionConfig::default();
        session.max_tool_iterations = 2;
        let responses = vec![
            tool_call_response("c1", "echo", serde_json::json!({})),
            tool_call_response("c2", "echo", serde_json::json!({})),
            tool_call_response("c3", "echo", serde_json::json!({})),
        ];
        let orch = Orchestrator::new(
            Arc::new(FakeLlmProvider::with_responses(responses)),
            registry_with(EchoTool),
            session,
            BudgetConfig::default(),
            None,
            None,
        );
        let reply = orch.chat("loop forever").await.unwrap();
        assert!(reply.contains("Maximum tool iterations"));
    }

    #[tokio::test]
    async fn clear_history_empties_conversation_and_resets_budget() {
        let llm = FakeLlmProvider::with_responses(vec![text_response("ok")]);
        let orch = orchestrator(llm, registry_with(EchoTool));
        orch.chat("hello").await.unwrap();
        assert!(!orch.get_history().is_empty());
        orch.clear_history();
        assert!(orch.get_history().is_empty());
    }

    #[tokio::test]
    async fn context_notification_fires_when_result_is_cached() {
        let cache = Arc::new(ResultCache::open_in_memory(cwa_resultcache::ResultCacheConfig::default()).unwrap());

        struct BigResultTool;
        #[async_trait]
        impl Tool for BigResultTool {
            fn name(&self) -> &str {
                "fetch_logs"
            }
            fn description(&self) -> &str {
                "returns a huge payload"
            }
            fn parameters(&self) -> Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            async fn execute(&self, _args: Value) -> Result<Value> {
                let events: Vec<Value> = (0..20)
                    .map(|i| serde_json::json!({"timestamp": 1_700_000_000_000i64 + i, "message": "x".repeat(400)}))
                    .collect();
                Ok(serde_json::json!({"success": true, "count": events.len(), "events": events}))
            }
        }

        let mut session = SessionConfig::default();
        session.cache_large_results_threshold = 10;
        let orch = Orchestrator::new(
            Arc::new(FakeLlmProvider::with_responses(vec![
                tool_call_response("c1", "fetch_logs", serde_json::json!({})),
                text_response("Here's what I found."),
            ])),
            registry_with(BigResultTool),
            session,
            BudgetConfig::default(),
            Some(cache),
            None,
        );

        let notified = Arc::new(Mutex::new(false));
        let notified_clone = Arc::clone(&notified);
        orch.set_context_notification_callback(move |n| {
            if n.message.contains("cached") {
                *notified_clone.lock() = true;
            }
        });

        orch.chat("fetch everything").await.unwrap();
        assert!(*notified.lock());
    }

    struct BigResultTool;
    #[async_trait]
    impl Tool for BigResultTool {
        fn name(&self) -> &str {
            "fetch_logs"
        }
        fn description(&self) -> &str {
            "returns a huge payload"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> Result<Value> {
            let events: Vec<Value> = (0..20)
                .map(|i| serde_json::json!({"timestamp": 1_700_000_000_000i64 + i, "message": "x".repeat(400)}))
                .collect();
            Ok(serde_json::json!({"success": true, "count": events.len(), "events": events}))
        }
    }

    #[tokio::test]
    async fn caching_a_result_injects_fetch_guidance_on_the_next_turn() {
        let cache = Arc::new(ResultCache::open_in_memory(cwa_resultcache::ResultCacheConfig::default()).unwrap());
        let mut session = SessionConfig::default();
        session.cache_large_results_threshold = 10;
        session.enable_auto_fetch_guidance = true;
        session.initial_chunk_size = 25;
        let orch = Orchestrator::new(
            Arc::new(FakeLlmProvider::with_responses(vec![
                tool_call_response("c1", "fetch_logs", serde_json::json!({})),
                text_response("First reply."),
                text_response("Second reply."),
            ])),
            registry_with(BigResultTool),
            session,
            BudgetConfig::default(),
            Some(cache),
            None,
        );

        orch.chat("fetch everything").await.unwrap();
        orch.chat("anything else?").await.unwrap();

        let history = orch.get_history();
        let guidance_idx = history.iter().position(|m| {
            m.role == Role::System && m.content.extract_all_text().contains("fetch_cached_result_chunk")
        });
        assert!(guidance_idx.is_some(), "expected a fetch-guidance system message in history");
        let text = history[guidance_idx.unwrap()].content.extract_all_text();
        assert!(text.contains("limit=25"));
    }

    #[tokio::test]
    async fn auto_fetch_guidance_is_suppressed_when_disabled() {
        let cache = Arc::new(ResultCache::open_in_memory(cwa_resultcache::ResultCacheConfig::default()).unwrap());
        let mut session = SessionConfig::default();
        session.cache_large_results_threshold = 10;
        session.enable_auto_fetch_guidance = false;
        let orch = Orchestrator::new(
            Arc::new(FakeLlmProvider::with_responses(vec![
                tool_call_response("c1", "fetch_logs", serde_json::json!({})),
                text_response("First reply."),
                text_response("Second reply."),
            ])),
            registry_with(BigResultTool),
            session,
            BudgetConfig::default(),
            Some(cache),
            None,
        );

        orch.chat("fetch everything").await.unwrap();
        orch.chat("anything else?").await.unwrap();

        let history = orch.get_history();
        let has_guidance = history.iter().any(|m| {
            m.role == Role::System && m.content.extract_all_text().contains("fetch_cached_result_chunk")
        });
        assert!(!has_guidance);
    }
}
