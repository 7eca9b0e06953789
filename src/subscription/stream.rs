use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{PathDbError, PathDbResult, TransportError};
use crate::path::NodePath;

use super::registry::{SubscriptionId, SubscriptionRegistry};
use super::ChangeEvent;

fn disconnected(path: &NodePath) -> PathDbError {
    PathDbError::Transport(TransportError::Disconnected {
        path: format!("subscription:{path}"),
    })
}

/// Stream of change events for one subscribed path.
///
/// Dropping the stream unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    path: NodePath,
    rx: Receiver<ChangeEvent>,
    registry: Weak<SubscriptionRegistry>,
    unregistered: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        path: NodePath,
        rx: Receiver<ChangeEvent>,
        registry: Weak<SubscriptionRegistry>,
    ) -> Self {
        Self {
            id,
            path,
            rx,
            registry,
            unregistered: AtomicBool::new(false),
        }
    }

    /// Id of this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscribed path.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Removes this subscription. Idempotent.
    ///
    /// Events already buffered can still be received.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id, &self.path);
        }
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> PathDbResult<ChangeEvent> {
        self.rx.recv().map_err(|_| disconnected(&self.path))
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> PathDbResult<ChangeEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PathDbError::Transport(TransportError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => disconnected(&self.path),
        })
    }

    /// Next buffered event, if any.
    pub fn try_recv(&self) -> PathDbResult<Option<ChangeEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(disconnected(&self.path)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
