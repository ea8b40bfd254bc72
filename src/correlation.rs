//! Payment correlation store
//!
//! Set of initiation transaction references seen on the realtime channel.
//! Consumers poll [`PaymentCorrelationStore::has`] for a reference they
//! generated before the server emitted anything; only the realtime router
//! writes to it.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Entries {
    order: VecDeque<(String, Instant)>,
    refs: HashSet<String>,
}

impl Entries {
    fn prune(&mut self, retention: Duration) {
        let now = Instant::now();
        while let Some((reference, seen_at)) = self.order.front() {
            if now.duration_since(*seen_at) < retention {
                break;
            }
            self.refs.remove(reference);
            self.order.pop_front();
        }
    }
}

/// Insertion-ordered, idempotent set of confirmed payment references
///
/// Cloning shares the underlying set.
#[derive(Debug, Clone, Default)]
pub struct PaymentCorrelationStore {
    entries: Arc<RwLock<Entries>>,
    retention: Option<Duration>,
}

impl PaymentCorrelationStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that forgets references older than `retention`
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            entries: Arc::default(),
            retention: Some(retention),
        }
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention
    }

    /// Whether `reference` has been observed
    pub async fn has(&self, reference: &str) -> bool {
        let entries = self.entries.read().await;
        if !entries.refs.contains(reference) {
            return false;
        }
        match self.retention {
            None => true,
            Some(retention) => entries
                .order
                .iter()
                .find(|(r, _)| r == reference)
                .map(|(_, seen_at)| seen_at.elapsed() < retention)
                .unwrap_or(false),
        }
    }

    /// Snapshot of every reference in first-seen order
    pub async fn all(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        entries
            .order
            .iter()
            .filter(|(_, seen_at)| match self.retention {
                Some(retention) => now.duration_since(*seen_at) < retention,
                None => true,
            })
            .map(|(reference, _)| reference.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.all().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Record a reference; returns `true` only on its first insertion
    pub(crate) async fn insert(&self, reference: &str) -> bool {
        let mut entries = self.entries.write().await;
        if let Some(retention) = self.retention {
            entries.prune(retention);
        }
        if !entries.refs.insert(reference.to_string()) {
            return false;
        }
        entries
            .order
            .push_back((reference.to_string(), Instant::now()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_creation() {
        let store = PaymentCorrelationStore::new();
        assert!(!store.has("TX-1").await);
        assert!(store.is_empty().await);
        assert_eq!(store.retention(), None);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = PaymentCorrelationStore::new();
        assert!(store.insert("TX-1").await);
        assert_eq!(store.len().await, 1);
        assert!(store.has("TX-1").await);

        assert!(!store.insert("TX-1").await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_all_preserves_first_seen_order() {
        let store = PaymentCorrelationStore::new();
        for reference in ["TX-3", "TX-1", "TX-2", "TX-1"] {
            store.insert(reference).await;
        }
        assert_eq!(store.all().await, vec!["TX-3", "TX-1", "TX-2"]);
    }

    #[tokio::test]
    async fn test_all_is_a_snapshot() {
        let store = PaymentCorrelationStore::new();
        store.insert("TX-1").await;
        let snapshot = store.all().await;
        store.insert("TX-2").await;
        assert_eq!(snapshot, vec!["TX-1"]);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = PaymentCorrelationStore::new();
        let reader = store.clone();
        store.insert("TX-9").await;
        assert!(reader.has("TX-9").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_forgets_old_references() {
        let store = PaymentCorrelationStore::with_retention(Duration::from_secs(60));
        store.insert("TX-old").await;

        tokio::time::advance(Duration::from_secs(30)).await;
        store.insert("TX-new").await;
        assert!(store.has("TX-old").await);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.has("TX-old").await);
        assert!(store.has("TX-new").await);
        assert_eq!(store.all().await, vec!["TX-new"]);

        // An expired reference counts as new again
        assert!(store.insert("TX-old").await);
        assert_eq!(store.all().await, vec!["TX-new", "TX-old"]);
    }
}
