//! Opaque associative recall, populated by the agent loop.

use crate::error::AgentResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One recorded memory entry.
#[derive(Debug, Clone)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Opaque persistence for agent recall, consumed but not defined by the core
/// loop — out of scope per the framework's purpose (no RAG/embedding
/// algorithms), only the uniform interface lives here.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn add_memory(&self, memory: Memory) -> AgentResult<()>;
    async fn search_memory(&self, query: &str) -> AgentResult<Vec<Memory>>;
}

/// A reference implementation backed by a `Vec` guarded by a lock, used as
/// both a tested default and the test double for agent/session tests.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    entries: Arc<RwLock<Vec<Memory>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn add_memory(&self, memory: Memory) -> AgentResult<()> {
        self.entries.write().await.push(memory);
        Ok(())
    }

    async fn search_memory(&self, query: &str) -> AgentResult<Vec<Memory>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|m| m.content.contains(query))
            .cloned()
            .collect())
    }
}
