//! Subscription registry.
//!
//! Owns the lookup trie and the per-path stream senders. Commits call
//! [`SubscriptionRegistry::notify`] with the changed paths; each matched
//! subscription path gets one event per commit through a non-blocking
//! send. A full stream drops the event and bumps a counter.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::path::NodePath;

use super::stream::Subscription;
use super::trie::NodeLookupTrie;
use super::ChangeEvent;

/// Identifier of one subscription stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    trie: NodeLookupTrie,
    streams: HashMap<NodePath, Vec<(SubscriptionId, Sender<ChangeEvent>)>>,
    closed: bool,
}

/// Path subscriptions of one database.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
    capacity: usize,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl SubscriptionRegistry {
    /// Creates a registry whose streams buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a stream for `path`.
    ///
    /// Adding a path that covers existing, finer subscriptions replaces
    /// them in the trie: those streams stay open but stop matching.
    pub fn subscribe(self: &Arc<Self>, path: NodePath) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = bounded(self.capacity);

        let mut state = self.state();
        if !state.closed {
            state.trie.add(&path);
            state.streams.entry(path.clone()).or_default().push((id, tx));
        }
        drop(state);

        debug!(subscription = %id, path = %path, "subscribed");
        Subscription::new(id, path, rx, Arc::downgrade(self))
    }

    /// Removes stream `id` of `path`. The last stream of a path removes
    /// its trie leaf.
    pub fn unsubscribe(&self, id: SubscriptionId, path: &NodePath) {
        let mut state = self.state();
        let Some(streams) = state.streams.get_mut(path) else {
            return;
        };
        streams.retain(|(sid, _)| *sid != id);
        if streams.is_empty() {
            state.streams.remove(path);
            state.trie.delete(path);
        }
    }

    /// Subscription paths matched by a change at any of `changed`, deduplicated.
    #[must_use]
    pub fn matching_paths(&self, changed: &[NodePath]) -> Vec<NodePath> {
        let state = self.state();
        let mut matched: Vec<NodePath> = Vec::new();
        for path in changed {
            let found = state.trie.find_matching_leaf_nodes(&path.to_entity_path());
            for hit in found.paths() {
                if !matched.contains(hit) {
                    matched.push(hit.clone());
                }
            }
        }
        matched
    }

    /// Sends one event per matched subscription path.
    ///
    /// `read` supplies the current value of a matched path.
    pub fn notify<F>(&self, changed: &[NodePath], read: F) -> usize
    where
        F: Fn(&NodePath) -> Value,
    {
        let matched = self.matching_paths(changed);
        let mut delivered = 0;
        for path in matched {
            let value = read(&path);
            let senders: Vec<(SubscriptionId, Sender<ChangeEvent>)> =
                self.state().streams.get(&path).cloned().unwrap_or_default();

            for (id, tx) in senders {
                let event = ChangeEvent {
                    path: path.clone(),
                    value: value.clone(),
                };
                match tx.try_send(event) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            subscription = %id,
                            path = %path,
                            "subscription buffer full; dropping event"
                        );
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        }
        delivered
    }

    /// Events dropped because a stream buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of registered trie leaves.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.state().trie.leaf_paths().len()
    }

    /// Disconnects every stream and refuses new registrations.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.streams.clear();
        state.trie.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn np(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn exact_ancestor_and_descendant_subscribers_are_notified() {
        let registry = Arc::new(SubscriptionRegistry::new(8));
        let exact = registry.subscribe(np("a/b"));
        let ancestor = registry.subscribe(np("x"));
        let descendant = registry.subscribe(np("m/n/o"));

        registry.notify(&[np("a/b"), np("x/y/z"), np("m")], |p| json!(p.to_string()));

        assert_eq!(exact.try_recv().unwrap().unwrap().path, np("a/b"));
        assert_eq!(ancestor.try_recv().unwrap().unwrap().value, json!("x"));
        assert_eq!(descendant.try_recv().unwrap().unwrap().path, np("m/n/o"));
    }

    #[test]
    fn one_event_per_matched_path_per_notify() {
        let registry = Arc::new(SubscriptionRegistry::new(8));
        let sub = registry.subscribe(np("a"));
        registry.notify(&[np("a/b"), np("a/c")], |_| Value::Null);
        assert!(sub.try_recv().unwrap().is_some());
        assert!(sub.try_recv().unwrap().is_none());
    }

    #[test]
    fn full_buffer_counts_drops() {
        let registry = Arc::new(SubscriptionRegistry::new(1));
        let _sub = registry.subscribe(np("a"));
        registry.notify(&[np("a")], |_| Value::Null);
        registry.notify(&[np("a")], |_| Value::Null);
        assert_eq!(registry.dropped_events(), 1);
    }

    #[test]
    fn last_unsubscribe_removes_trie_leaf() {
        let registry = Arc::new(SubscriptionRegistry::new(4));
        let first = registry.subscribe(np("a"));
        let second = registry.subscribe(np("a"));
        assert_eq!(registry.path_count(), 1);

        first.unsubscribe();
        first.unsubscribe();
        assert_eq!(registry.path_count(), 1);
        drop(second);
        assert_eq!(registry.path_count(), 0);
    }

    #[test]
    fn close_disconnects_streams() {
        let registry = Arc::new(SubscriptionRegistry::new(4));
        let sub = registry.subscribe(np("a"));
        registry.close();
        assert!(sub.recv().unwrap_err().is_transport());

        let late = registry.subscribe(np("b"));
        assert!(late.try_recv().is_err());
    }
}
