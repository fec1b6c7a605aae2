//! The reason-act loop: iterative prompt -> model -> tool-call -> prompt
//! cycles, bounded and recoverable, wrapped in the middleware chain.

use crate::middleware::{FinalHandler, MiddlewareChain, MiddlewareContext};
use agentkit_core::error::{AgentError, AgentResult};
use agentkit_core::llm::{GenerateRequest, LLMClient};
use agentkit_core::memory::{Memory, MemoryStore};
use agentkit_core::message::{Message, Role};
use agentkit_core::prompt::PromptManager;
use agentkit_core::tool::ToolRegistry;
use agentkit_core::context::Context;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_ITERATIONS: u32 = 10;
const DEFAULT_CONTEXT_SIZE: usize = 100;

/// A dynamic source of additional tool schemas, beyond the registry, that an
/// agent may consult per invocation (e.g. an MCP-style provider).
#[async_trait::async_trait]
pub trait ToolProvider: Send + Sync {
    async fn schemas(&self) -> AgentResult<Vec<serde_json::Value>>;
}

/// An orchestrator of a reason-act loop over an LLM plus tools.
///
/// Constructed once; mutated via `register_tool`, `add_middleware`,
/// `set_memory`, `restore_messages`, `clear_messages`. Cloning copies scalar
/// fields and shares the underlying registries/stores (all held behind
/// `Arc`).
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    system_prompt: String,
    llm: Arc<dyn LLMClient>,
    tools: ToolRegistry,
    prompts: Arc<PromptManager>,
    memory: Option<Arc<dyn MemoryStore>>,
    tool_providers: Vec<Arc<dyn ToolProvider>>,
    middleware: MiddlewareChain,
    max_iterations: u32,
    context: Context,
}

impl Agent {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>, llm: Arc<dyn LLMClient>) -> Self {
        let context = Context::new(DEFAULT_CONTEXT_SIZE);
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            llm,
            tools: ToolRegistry::new(),
            prompts: Arc::new(PromptManager::new()),
            memory: None,
            tool_providers: Vec::new(),
            middleware: MiddlewareChain::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            context,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn register_tool(&self, tool: Arc<dyn agentkit_core::tool::Tool>) -> AgentResult<()> {
        self.tools.register(tool).await
    }

    pub fn add_middleware(&mut self, interceptor: Arc<dyn crate::middleware::Interceptor>) -> &mut Self {
        self.middleware.add(interceptor);
        self
    }

    pub fn set_memory(&mut self, memory: Arc<dyn MemoryStore>) -> &mut Self {
        self.memory = Some(memory);
        self
    }

    pub fn add_tool_provider(&mut self, provider: Arc<dyn ToolProvider>) -> &mut Self {
        self.tool_providers.push(provider);
        self
    }

    /// Seed the agent's message buffer with `messages`, replacing its
    /// current contents (used by `Conversation`/`Orchestrator` to restore
    /// shared history before a `Run`).
    pub async fn restore_messages(&self, messages: Vec<Message>) {
        self.context.clear().await;
        for message in messages {
            self.context.add(message).await;
        }
    }

    pub async fn clear_messages(&self) {
        self.context.clear().await;
    }

    async fn build_tool_schemas(&self) -> AgentResult<Vec<serde_json::Value>> {
        let mut schemas = self.tools.to_schemas().await;
        for provider in &self.tool_providers {
            schemas.extend(provider.schemas().await?);
        }
        Ok(schemas)
    }

    async fn run_iterations(
        &self,
        emit: Option<&(dyn Fn(Message) -> AgentResult<()> + Send + Sync)>,
        cancellation: &CancellationToken,
    ) -> AgentResult<Message> {
        let mut last_assistant: Option<Message> = None;
        for iteration in 1..=self.max_iterations {
            if cancellation.is_cancelled() {
                return Err(AgentError::Cancelled("agent loop".to_string()));
            }
            let _span = tracing::info_span!("agent.iteration", agent = %self.name, iteration).entered();
            let schemas = self.build_tool_schemas().await?;
            let messages = self.context.get().await;
            let request = GenerateRequest::new(messages, schemas);

            let assistant_message = if iteration == self.max_iterations && emit.is_some() {
                self.generate_streamed(request, emit.unwrap(), cancellation).await?
            } else {
                self.llm
                    .generate(request)
                    .await
                    .map_err(|err| AgentError::ProviderError(anyhow::anyhow!(err)))?
                    .message
            };

            self.context.add(assistant_message.clone()).await;
            last_assistant = Some(assistant_message.clone());

            let tool_calls = match &assistant_message.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => return Ok(assistant_message),
            };

            for call in tool_calls {
                let result = self.tools.execute(&call.name, call.arguments.clone()).await;
                let text = match result {
                    Ok(output) => output,
                    Err(err) => {
                        tracing::warn!(tool = %call.name, error = %err, "tool execution failed");
                        format!("error: {err}")
                    }
                };
                self.context.add(Message::tool_result(call.id, text)).await;
            }
        }

        Err(AgentError::IterationLimitReached {
            max_iterations: self.max_iterations,
            last_message: last_assistant.map(Box::new),
        })
    }

    async fn generate_streamed(
        &self,
        request: GenerateRequest,
        emit: &(dyn Fn(Message) -> AgentResult<()> + Send + Sync),
        cancellation: &CancellationToken,
    ) -> AgentResult<Message> {
        let mut stream = self
            .llm
            .generate_stream(request)
            .await
            .map_err(|err| AgentError::ProviderError(anyhow::anyhow!(err)))?;

        let mut final_message: Option<Message> = None;
        loop {
            let item = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(AgentError::Cancelled("agent stream".to_string())),
                item = stream.next() => item,
            };
            let Some(item) = item else {
                break;
            };
            let message = item.map_err(|err| AgentError::ProviderError(anyhow::anyhow!(err)))?;
            let completed = message.completed;
            emit(message.clone())?;
            if completed {
                final_message = Some(message);
                break;
            }
        }
        let final_message = final_message.ok_or_else(|| {
            AgentError::ProviderError(anyhow::anyhow!("stream ended without a completed message"))
        })?;
        if final_message.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty()) {
            return Err(AgentError::ProviderError(anyhow::anyhow!(
                "streamed generation arrived with tool calls, which is unsupported"
            )));
        }
        Ok(final_message)
    }

    /// Run the agent loop to completion, synchronously.
    pub async fn run(&self, input: impl Into<String>, cancellation: &CancellationToken) -> AgentResult<Message> {
        self.run_inner(input.into(), None, cancellation).await
    }

    /// Same algorithm as `run`, but the terminal iteration's generation uses
    /// the streaming variant; partial messages are forwarded to `emit` as
    /// they arrive. Tool iterations are always non-streaming.
    pub async fn run_stream(
        &self,
        input: impl Into<String>,
        emit: impl Fn(Message) -> AgentResult<()> + Send + Sync + 'static,
        cancellation: &CancellationToken,
    ) -> AgentResult<Message> {
        self.run_inner(input.into(), Some(Arc::new(emit)), cancellation).await
    }

    async fn run_inner(
        &self,
        input: String,
        emit: Option<Arc<dyn Fn(Message) -> AgentResult<()> + Send + Sync>>,
        cancellation: &CancellationToken,
    ) -> AgentResult<Message> {
        if self.context.get_by_role(Role::System).await.is_empty() && !self.system_prompt.is_empty() {
            self.context.add(Message::system(self.system_prompt.clone())).await;
        }

        let mut mw_ctx = MiddlewareContext::new(input.clone(), self.context.get().await);
        mw_ctx.cancellation = cancellation.clone();

        let this = self.clone();
        let input_for_closure = input.clone();
        let cancellation = cancellation.clone();
        let final_handler: FinalHandler = Arc::new(move |ctx: &mut MiddlewareContext| {
            let this = this.clone();
            let input = input_for_closure.clone();
            let emit = emit.clone();
            let cancellation = cancellation.clone();
            Box::pin(async move {
                this.context.add(Message::user(input)).await;
                let emit_ref = emit.as_deref();
                let message = match this.run_iterations(emit_ref, &cancellation).await {
                    Ok(message) => message,
                    Err(err) => {
                        ctx.error = Some(err.clone_for_context());
                        return Err(err);
                    }
                };
                this.write_memory_summary().await;
                ctx.response = Some(message);
                Ok(())
            })
        });

        self.middleware.execute(&mut mw_ctx, final_handler).await?;
        mw_ctx
            .response
            .ok_or_else(|| AgentError::Internal(anyhow::anyhow!("run completed without a response")))
    }

    async fn write_memory_summary(&self) {
        let Some(memory) = &self.memory else {
            return;
        };
        let messages = self.context.get().await;
        let summary = messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.text_content()))
            .collect::<Vec<_>>()
            .join("\n");
        if let Err(err) = memory.add_memory(Memory::new(summary)).await {
            tracing::warn!(error = %err, "memory store write failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::llm::GenerateResponse;
    use agentkit_core::message::ToolCall;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct ScriptedClient {
        responses: AsyncMutex<Vec<Message>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Message>) -> Self {
            Self {
                responses: AsyncMutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _request: GenerateRequest) -> AgentResult<GenerateResponse> {
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Err(AgentError::Internal(anyhow::anyhow!("no more scripted responses")));
            }
            Ok(GenerateResponse {
                message: responses.remove(0),
            })
        }
    }

    struct AddTool;

    #[async_trait]
    impl agentkit_core::tool::Tool for AddTool {
        fn name(&self) -> &str {
            "add"
        }
        fn description(&self) -> &str {
            "adds two numbers"
        }
        fn parameters(&self) -> &[agentkit_core::tool::ToolParameter] {
            static PARAMS: std::sync::OnceLock<Vec<agentkit_core::tool::ToolParameter>> =
                std::sync::OnceLock::new();
            PARAMS.get_or_init(|| {
                vec![
                    agentkit_core::tool::ToolParameter {
                        name: "a".into(),
                        type_tag: "number".into(),
                        description: "first addend".into(),
                        required: true,
                        enum_values: None,
                        default: None,
                    },
                    agentkit_core::tool::ToolParameter {
                        name: "b".into(),
                        type_tag: "number".into(),
                        description: "second addend".into(),
                        required: true,
                        enum_values: None,
                        default: None,
                    },
                ]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> AgentResult<String> {
            let a = arguments["a"].as_f64().unwrap_or_default();
            let b = arguments["b"].as_f64().unwrap_or_default();
            Ok((a + b).to_string())
        }
    }

    #[tokio::test]
    async fn tool_round_trip_ends_after_two_iterations() {
        let tool_call = ToolCall {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments: json!({"a": 2, "b": 3}),
        };
        let client = ScriptedClient::new(vec![
            Message::assistant_with_tool_calls(vec![tool_call]),
            Message::assistant("5"),
        ]);
        let agent = Agent::new("calc", "you are a calculator", Arc::new(client));
        agent.register_tool(Arc::new(AddTool)).await.unwrap();

        let response = agent.run("what is 2+3", &CancellationToken::new()).await.unwrap();
        assert_eq!(response.text_content(), "5");

        let messages = agent.context().get().await;
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(messages[3].text_content(), "5");
    }

    #[tokio::test]
    async fn iteration_limit_reached_when_llm_always_calls_tool() {
        let mut responses = Vec::new();
        for i in 0..5 {
            let tool_call = ToolCall {
                id: format!("call_{i}"),
                name: "add".to_string(),
                arguments: json!({"a": 1, "b": 1}),
            };
            responses.push(Message::assistant_with_tool_calls(vec![tool_call]));
        }
        let client = ScriptedClient::new(responses);
        let agent = Agent::new("loopy", "sys", Arc::new(client)).with_max_iterations(3);
        agent.register_tool(Arc::new(AddTool)).await.unwrap();

        let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::IterationLimitReached { max_iterations: 3, .. }));
    }

    #[tokio::test]
    async fn rate_limiter_interceptor_rejects_second_run() {
        let client = ScriptedClient::new(vec![Message::assistant("ok"), Message::assistant("ok2")]);
        let mut agent = Agent::new("limited", "sys", Arc::new(client));
        let limiter = Arc::new(crate::middleware::RateLimiter::new(1));
        agent.add_middleware(Arc::new(crate::middleware::RateLimiterInterceptor::new(limiter)));

        let token = CancellationToken::new();
        agent.run("first", &token).await.unwrap();
        let err = agent.run("second", &token).await.unwrap_err();
        assert!(matches!(err, AgentError::RateLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn memory_store_write_happens_once_per_run() {
        let client = ScriptedClient::new(vec![Message::assistant("answer")]);
        let mut agent = Agent::new("mem", "sys", Arc::new(client));
        let memory = Arc::new(agentkit_core::memory::InMemoryMemoryStore::new());
        agent.set_memory(memory.clone());

        agent.run("question", &CancellationToken::new()).await.unwrap();
        let found = memory.search_memory("question").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn streaming_emits_partials_then_single_completed_message() {
        let client = ScriptedClient::new(vec![Message::assistant("hello world")]);
        let agent = Agent::new("streamer", "sys", Arc::new(client)).with_max_iterations(1);

        let emitted = Arc::new(AsyncMutex::new(Vec::new()));
        let emitted_clone = emitted.clone();
        let completed_count = Arc::new(AtomicUsize::new(0));
        let completed_count_clone = completed_count.clone();

        let response = agent
            .run_stream(
                "hi",
                move |msg: Message| {
                    if msg.completed {
                        completed_count_clone.fetch_add(1, Ordering::SeqCst);
                    }
                    let emitted_clone = emitted_clone.clone();
                    tokio::spawn(async move {
                        emitted_clone.lock().await.push(msg);
                    });
                    Ok(())
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.text_content(), "hello world");
        assert_eq!(completed_count.load(Ordering::SeqCst), 1);
    }

    struct StreamingToolCallClient;

    #[async_trait]
    impl LLMClient for StreamingToolCallClient {
        fn name(&self) -> &str {
            "streaming-tool-call"
        }

        async fn generate(&self, _request: GenerateRequest) -> AgentResult<GenerateResponse> {
            unreachable!("this client only exercises generate_stream")
        }

        async fn generate_stream(&self, _request: GenerateRequest) -> AgentResult<agentkit_core::llm::ChatStream> {
            let tool_call = ToolCall {
                id: "call_1".to_string(),
                name: "add".to_string(),
                arguments: json!({"a": 1, "b": 1}),
            };
            let item = Ok(Message::assistant_with_tool_calls(vec![tool_call]));
            Ok(Box::pin(futures::stream::iter(vec![item])))
        }
    }

    #[tokio::test]
    async fn streamed_completed_message_with_tool_calls_is_provider_error() {
        let agent = Agent::new("streamer", "sys", Arc::new(StreamingToolCallClient)).with_max_iterations(1);

        let err = agent
            .run_stream("go", |_msg: Message| Ok(()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ProviderError(_)));
    }

    #[tokio::test]
    async fn cancelled_token_stops_loop_before_first_generate() {
        let client = ScriptedClient::new(vec![Message::assistant("should not be reached")]);
        let agent = Agent::new("cancellable", "sys", Arc::new(client));

        let token = CancellationToken::new();
        token.cancel();
        let err = agent.run("go", &token).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled(_)));
    }

    #[tokio::test]
    async fn non_terminal_iteration_never_streams() {
        let tool_call = ToolCall {
            id: "call_1".to_string(),
            name: "add".to_string(),
            arguments: json!({"a": 1, "b": 1}),
        };
        let client = ScriptedClient::new(vec![
            Message::assistant_with_tool_calls(vec![tool_call]),
            Message::assistant("final"),
        ]);
        let agent = Agent::new("streamer", "sys", Arc::new(client)).with_max_iterations(2);
        agent.register_tool(Arc::new(AddTool)).await.unwrap();

        let completed_count = Arc::new(AtomicUsize::new(0));
        let completed_count_clone = completed_count.clone();
        let response = agent
            .run_stream(
                "go",
                move |msg: Message| {
                    if msg.completed {
                        completed_count_clone.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(response.text_content(), "final");
        // Only the terminal (second) iteration streams; the first (tool-calling)
        // iteration is non-streaming and so emits nothing.
        assert_eq!(completed_count.load(Ordering::SeqCst), 1);
    }
}
