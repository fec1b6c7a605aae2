//! Composes `agentkit-core`'s leaf components into the runtime: the
//! [`middleware::MiddlewareChain`] and built-in interceptors, the
//! [`agent::Agent`] reason-act loop, [`session::Session`]/
//! [`session::SessionManager`]/[`session::Conversation`], the
//! [`graph::Graph`] DAG executor, and the [`runner`] family.

pub mod agent;
pub mod graph;
pub mod middleware;
pub mod runner;
pub mod session;

pub mod prelude {
    pub use crate::agent::{Agent, ToolProvider};
    pub use crate::graph::{ConditionFn, ExecuteFn, Graph, GraphState, Node, NodeKind};
    pub use crate::middleware::{
        ContextEnricherInterceptor, ErrorHandlerInterceptor, Interceptor, InputValidatorInterceptor,
        MiddlewareChain, MiddlewareContext, RateLimiter, RateLimiterInterceptor,
        RequestLogInterceptor, ResponseFilterInterceptor, ResponseLogInterceptor,
        TimingInterceptor,
    };
    pub use crate::runner::{
        ConditionalRunner, ConditionalTask, ParallelRunner, Runner, SequentialRunner, Task, TaskResult,
    };
    pub use crate::session::{Conversation, Session, SessionManager, SessionState};
}
