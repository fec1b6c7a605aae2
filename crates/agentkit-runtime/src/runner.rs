//! Parallel, sequential, and conditional task dispatch with a bounded
//! concurrency semaphore and fault isolation.

use crate::agent::Agent;
use crate::graph::{Graph, GraphState};
use agentkit_core::error::{AgentError, AgentResult};
use agentkit_core::message::Message;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Owns a bounded concurrency semaphore shared by `Run`/`RunGraph`.
pub struct Runner {
    semaphore: Arc<Semaphore>,
}

const DEFAULT_CAPACITY: usize = 10;

impl Runner {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Acquire a permit (honoring `cancellation`), run the agent, release
    /// the permit.
    pub async fn run(
        &self,
        cancellation: &CancellationToken,
        agent: &Agent,
        input: impl Into<String>,
    ) -> AgentResult<Message> {
        let _permit = self.acquire(cancellation).await?;
        agent.run(input, cancellation).await
    }

    pub async fn run_graph(
        &self,
        cancellation: &CancellationToken,
        graph: &Graph,
        state: GraphState,
    ) -> AgentResult<GraphState> {
        let _permit = self.acquire(cancellation).await?;
        graph.execute(state).await
    }

    async fn acquire(
        &self,
        cancellation: &CancellationToken,
    ) -> AgentResult<tokio::sync::SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(AgentError::Cancelled("runner".to_string())),
            permit = self.semaphore.acquire() => permit.map_err(|err| AgentError::Internal(anyhow::anyhow!(err))),
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of work for [`ParallelRunner`]/[`SequentialRunner`]/[`ConditionalRunner`].
pub struct Task {
    pub id: String,
    pub agent: Agent,
    pub input: String,
}

impl Task {
    pub fn new(id: impl Into<String>, agent: Agent, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent,
            input: input.into(),
        }
    }
}

/// The outcome of one [`Task`]: its id, the rendered output text on success,
/// and the error message on failure. Exactly one of `output`/`error` is set.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl TaskResult {
    fn ok(task_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            output: Some(output.into()),
            error: None,
        }
    }

    fn err(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Runs every task under the runner's semaphore concurrently; returns
/// results in input order regardless of completion order. A panic inside a
/// task becomes an `Err` rather than aborting the batch.
pub struct ParallelRunner {
    runner: Runner,
}

impl ParallelRunner {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }

    pub async fn run_parallel(&self, cancellation: &CancellationToken, tasks: Vec<Task>) -> Vec<TaskResult> {
        let mut join_set: JoinSet<(usize, TaskResult)> = JoinSet::new();
        let semaphore = self.runner.semaphore.clone();
        let task_count = tasks.len();
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        for (index, task) in tasks.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let cancellation = cancellation.clone();
            join_set.spawn(async move {
                let task_id = task.id.clone();
                let permit = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (index, TaskResult::err(task_id, "parallel runner cancelled"));
                };
                let result = task.agent.run(task.input, &cancellation).await;
                let task_result = match result {
                    Ok(message) => TaskResult::ok(task_id, message.text_content()),
                    Err(err) => TaskResult::err(task_id, err.to_string()),
                };
                (index, task_result)
            });
        }

        let mut results: Vec<Option<TaskResult>> = (0..task_count).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(join_err) => {
                    if let Ok(panic) = join_err.try_into_panic() {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "task panicked".to_string());
                        tracing::warn!(panic = %message, "parallel task panicked");
                    }
                }
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, r)| r.unwrap_or_else(|| TaskResult::err(ids[index].clone(), "task panicked")))
            .collect()
    }
}

/// Runs tasks in order, feeding task *k*'s non-empty output text as input to
/// task *k+1*. Stops at the first error.
pub struct SequentialRunner {
    runner: Runner,
}

impl SequentialRunner {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }

    pub async fn run_sequential(
        &self,
        cancellation: &CancellationToken,
        mut tasks: Vec<Task>,
    ) -> (Vec<TaskResult>, Option<AgentError>) {
        let mut results = Vec::with_capacity(tasks.len());
        let mut carry: Option<String> = None;

        for task in tasks.drain(..) {
            let task_id = task.id.clone();
            let input = match &carry {
                Some(previous) if !previous.is_empty() => previous.clone(),
                _ => task.input.clone(),
            };
            match self.runner.run(cancellation, &task.agent, input).await {
                Ok(message) => {
                    carry = Some(message.text_content());
                    results.push(TaskResult::ok(task_id, message.text_content()));
                }
                Err(err) => {
                    results.push(TaskResult::err(task_id, err.to_string()));
                    return (results, Some(err));
                }
            }
        }
        (results, None)
    }
}

/// A sequential-style task gated by a predicate over the previous result.
pub struct ConditionalTask {
    pub task: Task,
    pub predicate: Arc<dyn Fn(Option<&Message>) -> AgentResult<bool> + Send + Sync>,
}

/// Runs tasks whose predicate (evaluated over the previous `Result`)
/// returns true; skips the rest. A predicate error or task error aborts the
/// batch, returning the partial results gathered so far.
pub struct ConditionalRunner {
    runner: Runner,
}

impl ConditionalRunner {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }

    pub async fn run_conditional(
        &self,
        cancellation: &CancellationToken,
        tasks: Vec<ConditionalTask>,
    ) -> (Vec<TaskResult>, Option<AgentError>) {
        let mut results: Vec<TaskResult> = Vec::new();
        let mut previous: Option<Message> = None;

        for conditional in tasks {
            let should_run = match (conditional.predicate)(previous.as_ref()) {
                Ok(flag) => flag,
                Err(err) => return (results, Some(err)),
            };
            if !should_run {
                continue;
            }
            let task_id = conditional.task.id.clone();
            match self
                .runner
                .run(cancellation, &conditional.task.agent, conditional.task.input)
                .await
            {
                Ok(message) => {
                    previous = Some(message.clone());
                    results.push(TaskResult::ok(task_id, message.text_content()));
                }
                Err(err) => {
                    results.push(TaskResult::err(task_id, err.to_string()));
                    return (results, Some(err));
                }
            }
        }
        (results, None)
    }
}
