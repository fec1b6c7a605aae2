//! Thread-safe bounded message buffer with system-message-preserving retention.

use crate::message::{Message, Role};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An ordered sequence of messages bounded to `max_size`, shared cheaply via
/// `Arc` so an [`Agent`](crate) and its [`Session`](crate) wrapper can hold
/// the same buffer.
#[derive(Clone)]
pub struct Context {
    inner: Arc<RwLock<Vec<Message>>>,
    max_size: usize,
}

impl Context {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Append `msg`, then enforce the retention policy if over capacity.
    ///
    /// All system messages are kept; the newest non-system messages fill the
    /// remaining capacity, in their original relative order. System messages
    /// are never reordered.
    pub async fn add(&self, msg: Message) {
        let mut messages = self.inner.write().await;
        messages.push(msg);
        if messages.len() > self.max_size {
            Self::retain(&mut messages, self.max_size);
        }
    }

    fn retain(messages: &mut Vec<Message>, max_size: usize) {
        let (system, non_system): (Vec<Message>, Vec<Message>) = messages
            .drain(..)
            .partition(|m| matches!(m.role, Role::System));
        let keep_non_system = max_size.saturating_sub(system.len());
        let start = non_system.len().saturating_sub(keep_non_system);
        let mut kept = system;
        kept.extend(non_system.into_iter().skip(start));
        *messages = kept;
    }

    /// A defensive copy of the current message list.
    pub async fn get(&self) -> Vec<Message> {
        self.inner.read().await.clone()
    }

    pub async fn get_last(&self) -> Option<Message> {
        self.inner.read().await.last().cloned()
    }

    pub async fn get_by_role(&self, role: Role) -> Vec<Message> {
        self.inner
            .read()
            .await
            .iter()
            .filter(|m| m.role == role)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn size(&self) -> usize {
        self.inner.read().await.len()
    }
}
