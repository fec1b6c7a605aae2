//! Crate-wide error type for the agent execution runtime.
//!
//! Every fallible operation in `agentkit-core` and `agentkit-runtime` returns
//! [`AgentResult<T>`]. Categories are distinguishable variants rather than a
//! single opaque string so callers can dispatch on them (e.g. a caller may
//! want to retry on `ProviderError` but not on `ValidationFailed`).

use crate::message::Message;
use thiserror::Error;

/// A typed error category for the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A referenced resource (tool, node, session id) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A registration attempted to reuse an existing name/id.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Malformed or missing input (empty name, missing required argument, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An input-validator or response-filter interceptor rejected the value.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A rate-limiter interceptor rejected the call.
    #[error("rate limit exceeded: {limit} calls")]
    RateLimitExceeded { limit: u32 },

    /// The agent loop exhausted its iteration bound without a final answer.
    #[error("iteration limit reached after {max_iterations} iterations")]
    IterationLimitReached {
        max_iterations: u32,
        last_message: Option<Box<Message>>,
    },

    /// A graph node was visited more times than its max-visits bound allows.
    #[error("graph loop detected at node '{node}': {visits} visits (max {max_visits})")]
    GraphLoopDetected {
        node: String,
        visits: u32,
        max_visits: u32,
    },

    /// A structural problem in a graph: missing start/end node, unknown branch key, dangling edge.
    #[error("graph topology error: {0}")]
    GraphTopologyError(String),

    /// The underlying LLM call failed.
    #[error("provider error: {0}")]
    ProviderError(#[source] anyhow::Error),

    /// A tool handler returned an error. Normally captured and surfaced as a
    /// tool-role message rather than propagated as a `Run` error.
    #[error("tool '{tool}' failed: {message}")]
    ToolError { tool: String, message: String },

    /// The call was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Unclassified / internal error.
    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl AgentError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    pub fn invalid_input(what: impl Into<String>) -> Self {
        Self::InvalidInput(what.into())
    }

    pub fn tool_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn graph_topology(what: impl Into<String>) -> Self {
        Self::GraphTopologyError(what.into())
    }

    /// A best-effort copy for stashing into `MiddlewareContext::error`
    /// alongside the real, returned `Err`. `anyhow::Error`-wrapping variants
    /// are not `Clone`, so this rebuilds an equivalent value carrying the
    /// original's `Display` text rather than its source chain.
    pub fn clone_for_context(&self) -> Self {
        match self {
            Self::NotFound(s) => Self::NotFound(s.clone()),
            Self::AlreadyExists(s) => Self::AlreadyExists(s.clone()),
            Self::InvalidInput(s) => Self::InvalidInput(s.clone()),
            Self::ValidationFailed(s) => Self::ValidationFailed(s.clone()),
            Self::RateLimitExceeded { limit } => Self::RateLimitExceeded { limit: *limit },
            Self::IterationLimitReached { max_iterations, last_message } => Self::IterationLimitReached {
                max_iterations: *max_iterations,
                last_message: last_message.clone(),
            },
            Self::GraphLoopDetected { node, visits, max_visits } => Self::GraphLoopDetected {
                node: node.clone(),
                visits: *visits,
                max_visits: *max_visits,
            },
            Self::GraphTopologyError(s) => Self::GraphTopologyError(s.clone()),
            Self::ProviderError(err) => Self::ProviderError(anyhow::anyhow!(err.to_string())),
            Self::ToolError { tool, message } => Self::ToolError {
                tool: tool.clone(),
                message: message.clone(),
            },
            Self::Cancelled(s) => Self::Cancelled(s.clone()),
            Self::Internal(err) => Self::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Internal(err.into())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Internal(err.into())
    }
}

/// Crate-wide result alias.
pub type AgentResult<T> = Result<T, AgentError>;
