//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! The model is asked for a reply; if it requests tools they are routed
//! through the [`ToolNamespace`], their results are appended to the trace,
//! and the model is asked again. The loop stops on a plain answer, on an
//! unrecoverable error, or when the iteration bound is reached.
//!
//! ```text
//!            ┌──────────────── tool results appended ───────────────┐
//!            ▼                                                      │
//!   ┌────────────────┐  tool calls   ┌────────────────────┐         │
//!   │ AwaitingModel  │──────────────▶│ AwaitingToolResult │─────────┘
//!   └────────────────┘               └────────────────────┘
//!        │ answer            │ error          │ routing error
//!        ▼                   ▼                ▼
//!      Done               Failed           Failed
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;

use crate::error::{AgentError, AgentInvocationError};
use crate::extract::extract_answers;
use crate::message::ConversationTrace;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::ToolNamespace;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt placed before the conversation
    pub system_prompt: Option<String>,

    /// Maximum model calls per run
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.into()),
            max_iterations: 10,
            generation: GenerationOptions::default(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r"You are a helpful AI assistant.

Use the available tools whenever they help answer the question.
After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate.";

/// Where a run currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    AwaitingModel,
    AwaitingToolResult,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingModel => write!(f, "awaiting_model"),
            Self::AwaitingToolResult => write!(f, "awaiting_tool_result"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A run that reached `Done`
#[derive(Clone, Debug)]
pub struct AgentRun {
    /// Full conversation, user query first
    pub trace: ConversationTrace,

    /// Every state the run passed through, in order
    pub states: Vec<RunState>,

    /// Number of model calls made
    pub model_calls: usize,

    /// True when the run stopped at the iteration bound with a partial answer
    pub hit_iteration_limit: bool,
}

impl AgentRun {
    /// Model-authored answer texts, in trace order
    pub fn answers(&self) -> Vec<String> {
        extract_answers(&self.trace)
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolNamespace>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolNamespace>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run the agent on a single user query
    pub async fn run(&self, query: &str) -> Result<AgentRun, AgentInvocationError> {
        self.run_trace(ConversationTrace::from_query(query)).await
    }

    /// Continue an existing trace until the model answers
    pub async fn run_trace(
        &self,
        mut trace: ConversationTrace,
    ) -> Result<AgentRun, AgentInvocationError> {
        if self.tools.is_empty() {
            return Err(AgentInvocationError {
                trace,
                source: AgentError::NoToolsAvailable,
            });
        }

        let mut states = vec![RunState::AwaitingModel];
        let mut model_calls = 0;

        loop {
            if model_calls >= self.config.max_iterations {
                return self.stop_at_limit(trace, states, model_calls);
            }

            model_calls += 1;
            let messages = trace.to_messages(self.config.system_prompt.as_deref());
            tracing::debug!(
                iteration = model_calls,
                messages = messages.len(),
                tokens = messages.iter().map(|m| m.estimate_tokens()).sum::<u32>(),
                "Requesting completion"
            );

            let completion = match self
                .provider
                .complete(&messages, self.tools.descriptors(), &self.config.generation)
                .await
            {
                Ok(completion) => completion,
                Err(source) => {
                    transition(&mut states, RunState::Failed);
                    return Err(AgentInvocationError { trace, source });
                }
            };

            if let Some(usage) = &completion.usage {
                tracing::debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    finish_reason = ?completion.finish_reason,
                    "Completion received"
                );
            }

            let wants_tools = completion.wants_tools();
            let calls = completion.tool_calls;
            trace.push_assistant(completion.content, calls.clone());

            if !wants_tools {
                transition(&mut states, RunState::Done);
                return Ok(AgentRun {
                    trace,
                    states,
                    model_calls,
                    hit_iteration_limit: false,
                });
            }

            // No model call is left to read the results
            if model_calls >= self.config.max_iterations {
                return self.stop_at_limit(trace, states, model_calls);
            }

            // Every name must route before anything runs
            let unroutable = calls
                .iter()
                .find(|c| self.tools.provider_of(&c.name).is_none());
            if let Some(unknown) = unroutable {
                tracing::error!(tool = %unknown.name, "Tool routing failed");
                transition(&mut states, RunState::Failed);
                return Err(AgentInvocationError {
                    trace,
                    source: AgentError::ToolNotFound(unknown.name.clone()),
                });
            }

            transition(&mut states, RunState::AwaitingToolResult);
            for call in &calls {
                tracing::info!(
                    tool = %call.name,
                    provider = self.tools.provider_of(&call.name).unwrap_or("?"),
                    "Executing tool"
                );
            }

            // join_all keeps results in call order, whatever order they finish in
            let results = join_all(calls.iter().map(|call| self.tools.invoke(call))).await;
            let mut failure = None;
            for result in results {
                match result {
                    Ok(result) => trace.push_tool_result(result),
                    Err(source) => {
                        tracing::error!(error = %source, "Tool call lost its provider");
                        if failure.is_none() {
                            failure = Some(source);
                        }
                    }
                }
            }
            if let Some(source) = failure {
                transition(&mut states, RunState::Failed);
                return Err(AgentInvocationError { trace, source });
            }

            transition(&mut states, RunState::AwaitingModel);
        }
    }

    /// End a run that used up its model calls
    fn stop_at_limit(
        &self,
        trace: ConversationTrace,
        mut states: Vec<RunState>,
        model_calls: usize,
    ) -> Result<AgentRun, AgentInvocationError> {
        if trace.has_answer() {
            tracing::warn!(
                max = self.config.max_iterations,
                "Iteration limit reached, returning partial answer"
            );
            transition(&mut states, RunState::Done);
            Ok(AgentRun {
                trace,
                states,
                model_calls,
                hit_iteration_limit: true,
            })
        } else {
            transition(&mut states, RunState::Failed);
            Err(AgentInvocationError {
                trace,
                source: AgentError::MaxIterations(self.config.max_iterations),
            })
        }
    }
}

fn transition(states: &mut Vec<RunState>, next: RunState) {
    if let Some(current) = states.last() {
        tracing::debug!(from = %current, to = %next, "Agent state transition");
    }
    states.push(next);
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolNamespace>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolNamespace::new()),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<ToolNamespace>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> crate::Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(provider, self.tools, self.config))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::message::{ConversationTurn, Message};
    use crate::provider::Completion;
    use crate::tool::{ToolBackend, ToolCall, ToolDescriptor, ToolResult};

    /// Replays canned completions in order
    struct ScriptedProvider {
        replies: Mutex<VecDeque<crate::Result<Completion>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<crate::Result<Completion>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn repeating(reply: &Completion, times: usize) -> Arc<Self> {
            Self::new((0..times).map(|_| Ok(reply.clone())).collect())
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn health_check(&self) -> crate::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            tools: &[ToolDescriptor],
            _options: &GenerationOptions,
        ) -> crate::Result<Completion> {
            assert!(!tools.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".into())))
        }
    }

    /// Answers every call after an optional per-tool delay
    #[derive(Default)]
    struct SlowBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolBackend for SlowBackend {
        fn provider_name(&self) -> &str {
            "slow"
        }

        async fn call_tool(&self, call: &ToolCall) -> crate::Result<ToolResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = call.arguments["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ToolResult::success(call.name.clone(), format!("{delay}ms")))
        }
    }

    /// A provider whose session died after aggregation
    struct GoneBackend;

    #[async_trait]
    impl ToolBackend for GoneBackend {
        fn provider_name(&self) -> &str {
            "gone"
        }

        async fn call_tool(&self, _call: &ToolCall) -> crate::Result<ToolResult> {
            Err(AgentError::Connection {
                provider: "gone".into(),
                message: "transport closed".into(),
            })
        }
    }

    fn namespace_with(backend: Arc<SlowBackend>) -> Arc<ToolNamespace> {
        let mut ns = ToolNamespace::new();
        ns.register(
            backend,
            vec![
                ToolDescriptor::new("t1", "first", serde_json::json!({}), "slow"),
                ToolDescriptor::new("t2", "second", serde_json::json!({}), "slow"),
            ],
        );
        ns.register(
            Arc::new(GoneBackend),
            vec![ToolDescriptor::new("lost", "dead provider", serde_json::json!({}), "gone")],
        );
        Arc::new(ns)
    }

    fn namespace() -> Arc<ToolNamespace> {
        namespace_with(Arc::new(SlowBackend::default()))
    }

    fn call(name: &str, delay_ms: u64, id: &str) -> ToolCall {
        ToolCall::new(name, serde_json::json!({"delay_ms": delay_ms})).with_id(id)
    }

    fn agent(provider: Arc<ScriptedProvider>, max_iterations: usize) -> Agent {
        agent_with(provider, namespace(), max_iterations)
    }

    fn agent_with(
        provider: Arc<ScriptedProvider>,
        tools: Arc<ToolNamespace>,
        max_iterations: usize,
    ) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tools(tools)
            .max_iterations(max_iterations)
            .build()
            .unwrap()
    }

    fn tool_result_ids(trace: &ConversationTrace) -> Vec<&str> {
        trace
            .iter()
            .filter_map(|t| match t {
                ConversationTurn::ToolResult { call_id, .. } => call_id.as_deref(),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let provider = ScriptedProvider::new(vec![Ok(Completion::text("hello", "m"))]);
        let run = agent(provider.clone(), 5).run("hi").await.unwrap();

        assert_eq!(run.states, vec![RunState::AwaitingModel, RunState::Done]);
        assert_eq!(run.answers(), vec!["hello"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_tool_round_trip() {
        let provider = ScriptedProvider::new(vec![
            Ok(Completion::with_tool_calls("", vec![call("t1", 0, "c1")], "m")),
            Ok(Completion::text("done", "m")),
        ]);
        let run = agent(provider, 5).run("use a tool").await.unwrap();

        assert_eq!(
            run.states,
            vec![
                RunState::AwaitingModel,
                RunState::AwaitingToolResult,
                RunState::AwaitingModel,
                RunState::Done,
            ]
        );
        let kinds: Vec<(bool, bool, bool)> = run
            .trace
            .iter()
            .map(|t| (t.is_user(), t.is_assistant(), t.is_tool_result()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (true, false, false),
                (false, true, false),
                (false, false, true),
                (false, true, false),
            ]
        );
        assert_eq!(run.model_calls, 2);
        assert!(!run.hit_iteration_limit);
    }

    #[tokio::test]
    async fn test_multi_call_results_keep_call_order() {
        let provider = ScriptedProvider::new(vec![
            Ok(Completion::with_tool_calls(
                "",
                vec![call("t1", 40, "slow"), call("t2", 0, "fast")],
                "m",
            )),
            Ok(Completion::text("both done", "m")),
        ]);
        let run = agent(provider, 5).run("two tools").await.unwrap();

        assert_eq!(tool_result_ids(&run.trace), vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_partial_trace() {
        let provider = ScriptedProvider::new(vec![
            Ok(Completion::with_tool_calls("", vec![call("t1", 0, "c1")], "m")),
            Err(AgentError::Provider("model crashed".into())),
        ]);
        let err = agent(provider, 5).run("q").await.unwrap_err();

        assert!(matches!(err.source, AgentError::Provider(_)));
        assert_eq!(err.trace.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_run() {
        let provider = ScriptedProvider::new(vec![Ok(Completion::with_tool_calls(
            "",
            vec![call("missing", 0, "c1")],
            "m",
        ))]);
        let err = agent(provider, 5).run("q").await.unwrap_err();

        assert!(matches!(err.source, AgentError::ToolNotFound(_)));
        assert!(err.trace.last().is_some_and(ConversationTurn::is_assistant));
    }

    #[tokio::test]
    async fn test_unknown_tool_stops_whole_turn_before_dispatch() {
        let backend = Arc::new(SlowBackend::default());
        let provider = ScriptedProvider::new(vec![Ok(Completion::with_tool_calls(
            "",
            vec![call("missing", 0, "c1"), call("t1", 0, "c2")],
            "m",
        ))]);
        let err = agent_with(provider, namespace_with(backend.clone()), 5)
            .run("q")
            .await
            .unwrap_err();

        assert!(matches!(&err.source, AgentError::ToolNotFound(name) if name == "missing"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(tool_result_ids(&err.trace).is_empty());
    }

    #[tokio::test]
    async fn test_lost_provider_keeps_sibling_results() {
        let provider = ScriptedProvider::new(vec![Ok(Completion::with_tool_calls(
            "",
            vec![call("t1", 10, "a"), call("lost", 0, "b"), call("t2", 0, "c")],
            "m",
        ))]);
        let err = agent(provider, 5).run("q").await.unwrap_err();

        assert!(matches!(&err.source, AgentError::Connection { provider, .. } if provider == "gone"));
        assert_eq!(tool_result_ids(&err.trace), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_iteration_limit_with_partial_answer() {
        let reply = Completion::with_tool_calls("still looking", vec![call("t1", 0, "c")], "m");
        let provider = ScriptedProvider::repeating(&reply, 10);
        let backend = Arc::new(SlowBackend::default());
        let run = agent_with(provider.clone(), namespace_with(backend.clone()), 3)
            .run("q")
            .await
            .unwrap();

        assert!(run.hit_iteration_limit);
        assert_eq!(run.model_calls, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(run.states.last(), Some(&RunState::Done));
        // calls requested by the last model reply are never run
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(run.trace.last().is_some_and(ConversationTurn::is_assistant));
    }

    #[tokio::test]
    async fn test_iteration_limit_without_answer() {
        let reply = Completion::with_tool_calls("", vec![call("t1", 0, "c")], "m");
        let provider = ScriptedProvider::repeating(&reply, 10);
        let err = agent(provider, 2).run("q").await.unwrap_err();

        assert!(matches!(err.source, AgentError::MaxIterations(2)));
    }

    #[tokio::test]
    async fn test_single_call_budget_ends_on_model_turn() {
        let reply = Completion::with_tool_calls("checking", vec![call("t1", 0, "c")], "m");
        let provider = ScriptedProvider::repeating(&reply, 1);
        let run = agent(provider, 1).run("q").await.unwrap();

        assert!(run.hit_iteration_limit);
        assert!(tool_result_ids(&run.trace).is_empty());
        assert!(run.trace.last().is_some_and(ConversationTurn::is_assistant));
        assert_eq!(run.states, vec![RunState::AwaitingModel, RunState::Done]);
    }

    #[tokio::test]
    async fn test_empty_namespace_never_calls_model() {
        let provider = ScriptedProvider::new(vec![Ok(Completion::text("hi", "m"))]);
        let agent = AgentBuilder::new().provider(provider.clone()).build().unwrap();
        let err = agent.run("q").await.unwrap_err();

        assert!(matches!(err.source, AgentError::NoToolsAvailable));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(
            AgentBuilder::new().build(),
            Err(AgentError::Config(_))
        ));
    }
}
