//! A named handle over an [`Agent`] with lifecycle and snapshotting, plus the
//! manager that owns a collection of sessions and an optional store, and the
//! `Conversation`/`Orchestrator` variant for multi-agent shared history.

use crate::agent::Agent;
use agentkit_core::error::{AgentError, AgentResult};
use agentkit_core::message::Message;
use agentkit_core::session_store::{SessionSnapshot, SessionStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closed,
}

struct SessionInner {
    state: SessionState,
    last_duration_ms: Option<u64>,
}

/// Wraps an [`Agent`] plus identity and snapshotting.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    agent: Agent,
    inner: Arc<RwLock<SessionInner>>,
}

impl Session {
    pub fn new(id: impl Into<String>, agent: Agent) -> Self {
        Self {
            id: id.into(),
            agent,
            inner: Arc::new(RwLock::new(SessionInner {
                state: SessionState::Active,
                last_duration_ms: None,
            })),
        }
    }

    pub async fn run(&self, input: impl Into<String>, cancellation: &CancellationToken) -> AgentResult<Message> {
        {
            let inner = self.inner.read().await;
            if inner.state == SessionState::Closed {
                return Err(AgentError::invalid_input(format!(
                    "session '{}' is closed",
                    self.id
                )));
            }
        }
        let started = Instant::now();
        let result = self.agent.run(input, cancellation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.inner.write().await.last_duration_ms = Some(elapsed_ms);
        result
    }

    pub async fn get_messages(&self) -> Vec<Message> {
        self.agent.context().get().await
    }

    pub async fn get_state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn close(&self) {
        self.inner.write().await.state = SessionState::Closed;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        let messages = self.agent.context().get().await;
        let now = Utc::now();
        SessionSnapshot {
            session_id: self.id.clone(),
            last_message: messages.last().cloned(),
            messages,
            last_duration_ms: inner.last_duration_ms,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

/// Owns an id -> session map plus an optional [`SessionStore`].
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    pub fn with_store(store: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: Some(store),
        }
    }

    /// Create and register a new session bound to `agent`, under a
    /// generated id. Fails on duplicate id (practically unreachable here
    /// since the id is freshly generated; see `create_with_id` to exercise
    /// the duplicate-id rejection path deliberately).
    pub async fn create(&self, agent: Agent, cancellation: &CancellationToken) -> AgentResult<Session> {
        self.create_with_id(Uuid::new_v4().to_string(), agent, cancellation).await
    }

    /// Create and register a new session bound to `agent` under a
    /// caller-supplied id. Fails with `AlreadyExists` if `id` is already
    /// registered.
    pub async fn create_with_id(
        &self,
        id: impl Into<String>,
        agent: Agent,
        cancellation: &CancellationToken,
    ) -> AgentResult<Session> {
        Self::check_cancelled(cancellation)?;
        let id = id.into();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(AgentError::already_exists(format!("session '{id}'")));
        }
        let session = Session::new(id.clone(), agent);
        sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Persist `session`'s snapshot through the configured store, if any.
    pub async fn save(&self, session: &Session, cancellation: &CancellationToken) -> AgentResult<()> {
        Self::check_cancelled(cancellation)?;
        if let Some(store) = &self.store {
            store.save(session.snapshot().await).await?;
        }
        Ok(())
    }

    pub async fn delete(&self, session_id: &str, cancellation: &CancellationToken) -> AgentResult<()> {
        Self::check_cancelled(cancellation)?;
        self.sessions.write().await.remove(session_id);
        if let Some(store) = &self.store {
            store.delete(session_id).await?;
        }
        Ok(())
    }

    pub async fn get(&self, session_id: &str, cancellation: &CancellationToken) -> AgentResult<Session> {
        Self::check_cancelled(cancellation)?;
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AgentError::not_found(format!("session '{session_id}'")))
    }

    pub async fn list(&self, cancellation: &CancellationToken) -> AgentResult<Vec<Session>> {
        Self::check_cancelled(cancellation)?;
        Ok(self.sessions.read().await.values().cloned().collect())
    }

    pub async fn count(&self, cancellation: &CancellationToken) -> AgentResult<usize> {
        Self::check_cancelled(cancellation)?;
        Ok(self.sessions.read().await.len())
    }

    fn check_cancelled(cancellation: &CancellationToken) -> AgentResult<()> {
        if cancellation.is_cancelled() {
            return Err(AgentError::Cancelled("session manager".to_string()));
        }
        Ok(())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets multiple distinct agents participate in one conversation-history
/// stream: before invoking an agent's `Run` it seeds that agent's message
/// buffer with the session's current history; after `Run` it writes the
/// updated buffer back to the session's agent. This is a thin wrapper, not a
/// new storage abstraction — the session remains the source of truth.
pub struct Conversation {
    session: Session,
}

impl Conversation {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Run `agent` against this conversation's shared history under
    /// `input`, writing the resulting history back into the session.
    pub async fn run_with(
        &self,
        agent: &Agent,
        input: impl Into<String>,
        cancellation: &CancellationToken,
    ) -> AgentResult<Message> {
        let history = self.session.get_messages().await;
        agent.restore_messages(history).await;
        let response = agent.run(input, cancellation).await;
        let updated = agent.context().get().await;
        self.session.agent().restore_messages(updated).await;
        response
    }
}
