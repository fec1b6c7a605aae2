//! A composable, bidirectional interceptor pipeline around every agent
//! invocation, plus the built-in interceptors shipped over the same
//! abstraction (request-log, response-log, input-validator, response-filter,
//! context-enricher, error-handler, rate-limiter).

use agentkit_core::error::{AgentError, AgentResult};
use agentkit_core::message::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Per-invocation state threaded through the chain. Interceptors read and
/// mutate it before calling `next`, and may inspect `response`/`error` after
/// `next` returns.
pub struct MiddlewareContext {
    pub cancellation: CancellationToken,
    pub input: String,
    pub messages: Vec<Message>,
    pub response: Option<Message>,
    pub error: Option<AgentError>,
    pub metadata: HashMap<String, String>,
}

impl MiddlewareContext {
    pub fn new(input: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            input: input.into(),
            messages,
            response: None,
            error: None,
            metadata: HashMap::new(),
        }
    }
}

/// The terminal handler at the end of a chain: the business closure that
/// actually runs the agent loop.
pub type FinalHandler =
    Arc<dyn Fn(&mut MiddlewareContext) -> BoxFuture<'_, AgentResult<()>> + Send + Sync>;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One link in the chain. `call` receives the context and a `next` handler
/// it may invoke zero or one time; it may inspect `ctx.response`/`ctx.error`
/// after `next` returns, and may return an error to abort the chain.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn call(
        &self,
        ctx: &mut MiddlewareContext,
        next: Next<'_>,
    ) -> AgentResult<()>;
}

/// A boxed recursive "call the rest of the chain" continuation.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    index: usize,
    final_handler: &'a FinalHandler,
}

impl<'a> Next<'a> {
    pub async fn call(self, ctx: &mut MiddlewareContext) -> AgentResult<()> {
        match self.chain.get(self.index) {
            Some(interceptor) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                    final_handler: self.final_handler,
                };
                interceptor.call(ctx, next).await
            }
            None => (self.final_handler)(ctx).await,
        }
    }
}

/// An ordered sequence of interceptors wrapping a final business closure.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Invoke interceptor 0, which decides whether/when to invoke interceptor
    /// 1 and so on; the tail of the chain invokes `final_handler`. If an
    /// interceptor never calls `next`, everything downstream (including
    /// `final_handler`) is skipped.
    pub async fn execute(
        &self,
        ctx: &mut MiddlewareContext,
        final_handler: FinalHandler,
    ) -> AgentResult<()> {
        let next = Next {
            chain: &self.interceptors,
            index: 0,
            final_handler: &final_handler,
        };
        next.call(ctx).await
    }
}

/// Logs the request before the rest of the chain runs.
pub struct RequestLogInterceptor;

#[async_trait]
impl Interceptor for RequestLogInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        tracing::debug!(input = %ctx.input, "agent request received");
        next.call(ctx).await
    }
}

/// Logs the response (or error) after the rest of the chain runs.
pub struct ResponseLogInterceptor;

#[async_trait]
impl Interceptor for ResponseLogInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        let result = next.call(ctx).await;
        match &result {
            Err(err) => tracing::warn!(error = %err, "agent request failed"),
            Ok(()) => tracing::debug!(
                response = ctx.response.as_ref().map(|m| m.text_content()).unwrap_or_default(),
                "agent request completed"
            ),
        }
        result
    }
}

/// Rejects the request up front if `predicate(&ctx.input)` returns false.
pub struct InputValidatorInterceptor {
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    message: String,
}

impl InputValidatorInterceptor {
    pub fn new(message: impl Into<String>, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Interceptor for InputValidatorInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        if !(self.predicate)(&ctx.input) {
            return Err(AgentError::ValidationFailed(self.message.clone()));
        }
        next.call(ctx).await
    }
}

/// Rejects the response after the rest of the chain runs if
/// `predicate(&response)` returns false.
pub struct ResponseFilterInterceptor {
    predicate: Arc<dyn Fn(&Message) -> bool + Send + Sync>,
    message: String,
}

impl ResponseFilterInterceptor {
    pub fn new(message: impl Into<String>, predicate: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Interceptor for ResponseFilterInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        next.call(ctx).await?;
        if let Some(response) = &ctx.response {
            if !(self.predicate)(response) {
                let message = self.message.clone();
                ctx.response = None;
                return Err(AgentError::ValidationFailed(message));
            }
        }
        Ok(())
    }
}

/// Mutates `ctx.metadata` before the rest of the chain runs.
pub struct ContextEnricherInterceptor {
    enrich: Arc<dyn Fn(&mut HashMap<String, String>) + Send + Sync>,
}

impl ContextEnricherInterceptor {
    pub fn new(enrich: impl Fn(&mut HashMap<String, String>) + Send + Sync + 'static) -> Self {
        Self {
            enrich: Arc::new(enrich),
        }
    }
}

#[async_trait]
impl Interceptor for ContextEnricherInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        (self.enrich)(&mut ctx.metadata);
        next.call(ctx).await
    }
}

/// Post-hoc error remapping: runs the rest of the chain, then gives `map` a
/// chance to replace whatever error came back.
pub struct ErrorHandlerInterceptor {
    map: Arc<dyn Fn(AgentError) -> AgentError + Send + Sync>,
}

impl ErrorHandlerInterceptor {
    pub fn new(map: impl Fn(AgentError) -> AgentError + Send + Sync + 'static) -> Self {
        Self { map: Arc::new(map) }
    }
}

#[async_trait]
impl Interceptor for ErrorHandlerInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        match next.call(ctx).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let mapped = (self.map)(err);
                ctx.error = Some(mapped.clone_for_context());
                Err(mapped)
            }
        }
    }
}

/// Counter-based rate limiter: fails with `RateLimitExceeded` once the
/// counter reaches `max`. `reset` returns the counter to zero.
pub struct RateLimiter {
    max: u32,
    count: AtomicU32,
}

impl RateLimiter {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            count: AtomicU32::new(0),
        }
    }

    pub fn check(&self) -> AgentResult<()> {
        let previous = self.count.fetch_add(1, Ordering::SeqCst);
        if previous >= self.max {
            self.count.fetch_sub(1, Ordering::SeqCst);
            return Err(AgentError::RateLimitExceeded { limit: self.max });
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

pub struct RateLimiterInterceptor {
    limiter: Arc<RateLimiter>,
}

impl RateLimiterInterceptor {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Interceptor for RateLimiterInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        self.limiter.check()?;
        next.call(ctx).await
    }
}

/// Measures wall-clock duration of the downstream chain, stashing it in
/// `ctx.metadata["duration_ms"]` — used by `Session::run` (see
/// `agentkit_runtime::session`).
pub struct TimingInterceptor {
    start: Mutex<Option<Instant>>,
}

impl Default for TimingInterceptor {
    fn default() -> Self {
        Self {
            start: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Interceptor for TimingInterceptor {
    async fn call(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> AgentResult<()> {
        let started = Instant::now();
        *self.start.lock().await = Some(started);
        let result = next.call(ctx).await;
        let elapsed: Duration = started.elapsed();
        ctx.metadata
            .insert("duration_ms".to_string(), elapsed.as_millis().to_string());
        result
    }
}
