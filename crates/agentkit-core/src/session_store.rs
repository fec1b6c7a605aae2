//! Opaque persistence for session snapshots.

use crate::error::AgentResult;
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A value-copy of a Session's messages plus metadata, suitable for
/// persistence.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub last_message: Option<Message>,
    pub last_duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Save/Load/Delete/List snapshot records keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, snapshot: SessionSnapshot) -> AgentResult<()>;
    async fn load(&self, session_id: &str) -> AgentResult<Option<SessionSnapshot>>;
    async fn delete(&self, session_id: &str) -> AgentResult<()>;
    async fn list(&self) -> AgentResult<Vec<SessionSnapshot>>;
}

/// A reference implementation backed by a map guarded by a lock.
#[derive(Default)]
pub struct InMemorySessionStore {
    snapshots: Arc<RwLock<HashMap<String, SessionSnapshot>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, snapshot: SessionSnapshot) -> AgentResult<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.session_id.clone(), snapshot);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> AgentResult<Option<SessionSnapshot>> {
        Ok(self.snapshots.read().await.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> AgentResult<()> {
        self.snapshots.write().await.remove(session_id);
        Ok(())
    }

    async fn list(&self) -> AgentResult<Vec<SessionSnapshot>> {
        Ok(self.snapshots.read().await.values().cloned().collect())
    }
}
