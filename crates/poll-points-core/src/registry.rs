//! Registry of polls created by this bot instance.
//!
//! Only answers to polls in the registry are eligible for points. The set is
//! kept in memory for the lifetime of the process and is never pruned, so
//! polls created before a restart are no longer credited afterwards.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

/// Lookup of the polls this instance is responsible for
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PollRegistry: Send + Sync {
    /// Add a poll to the active set
    async fn register(&self, poll_id: String);
    /// Check whether a poll was created by this instance
    async fn is_active(&self, poll_id: &str) -> bool;
    /// Number of registered polls
    async fn active_count(&self) -> usize;
}

/// Process-local poll registry guarded by an async `RwLock`
#[derive(Default)]
pub struct InMemoryPollRegistry {
    active: RwLock<HashSet<String>>,
}

impl InMemoryPollRegistry {
    /// Creates an empty registry
    ///
    /// # Examples
    ///
    /// ```
    /// use poll_points_core::registry::{InMemoryPollRegistry, PollRegistry};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let registry = InMemoryPollRegistry::new();
    /// registry.register("5312".to_string()).await;
    /// assert!(registry.is_active("5312").await);
    /// # }
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollRegistry for InMemoryPollRegistry {
    async fn register(&self, poll_id: String) {
        let mut active = self.active.write().await;
        if active.insert(poll_id.clone()) {
            debug!("Registered poll {poll_id} ({} active)", active.len());
        }
    }

    async fn is_active(&self, poll_id: &str) -> bool {
        self.active.read().await.contains(poll_id)
    }

    async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_poll_is_inactive() {
        let registry = InMemoryPollRegistry::new();
        assert!(!registry.is_active("missing").await);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_is_visible_and_idempotent() {
        let registry = InMemoryPollRegistry::new();
        registry.register("p1".to_string()).await;
        registry.register("p1".to_string()).await;
        registry.register("p2".to_string()).await;

        assert!(registry.is_active("p1").await);
        assert!(registry.is_active("p2").await);
        assert_eq!(registry.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(InMemoryPollRegistry::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.register(format!("poll-{i}")).await;
                    registry.is_active(&format!("poll-{i}")).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(registry.active_count().await, 32);
    }
}
