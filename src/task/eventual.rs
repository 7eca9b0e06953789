//! One-shot eventual results.
//!
//! [`Eventual`] is the result type every dispatcher returns, whether the
//! work completed synchronously or will be settled later by another
//! thread. [`OpenPromise`] hands the settling side ([`Resolver`]) to the
//! creator instead of hiding it inside a constructor callback.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{PathDbError, PathDbResult, TransportError};

fn disconnected() -> PathDbError {
    PathDbError::Transport(TransportError::Disconnected {
        path: "eventual".to_string(),
    })
}

/// A result that becomes available once, possibly on another thread.
pub struct Eventual<T> {
    rx: Receiver<PathDbResult<T>>,
}

impl<T> fmt::Debug for Eventual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eventual").field("ready", &!self.rx.is_empty()).finish()
    }
}

impl<T> Eventual<T> {
    /// An eventual that is already settled.
    #[must_use]
    pub fn ready(result: PathDbResult<T>) -> Self {
        let (tx, rx) = bounded(1);
        // Capacity 1 and no other sender: cannot fail.
        let _ = tx.send(result);
        Self { rx }
    }

    /// Already resolved with `value`.
    #[must_use]
    pub fn ok(value: T) -> Self {
        Self::ready(Ok(value))
    }

    /// Already rejected with `err`.
    #[must_use]
    pub fn err(err: impl Into<PathDbError>) -> Self {
        Self::ready(Err(err.into()))
    }

    /// Blocks until settled.
    ///
    /// A resolver dropped without settling surfaces as a disconnected
    /// transport error.
    pub fn wait(self) -> PathDbResult<T> {
        self.rx.recv().map_err(|_| disconnected())?
    }

    /// Blocks for at most `timeout`.
    ///
    /// A timeout does not consume the eventual; it may still settle later.
    pub fn wait_timeout(&self, timeout: Duration) -> PathDbResult<T> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PathDbError::Transport(TransportError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })?
    }

    /// Takes the result if it is already available.
    pub fn try_take(&self) -> Option<PathDbResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(disconnected())),
        }
    }

    /// True once a result is waiting to be taken.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.rx.is_empty()
    }
}

/// Settling side of an [`OpenPromise`].
///
/// Consumed by the first settle call, so a result is delivered at most once.
pub struct Resolver<T> {
    tx: Sender<PathDbResult<T>>,
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T> Resolver<T> {
    /// Delivers `result`. Returns false if nobody is waiting anymore.
    pub fn settle(self, result: PathDbResult<T>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Resolves with `value`.
    pub fn resolve(self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects with `err`.
    pub fn reject(self, err: impl Into<PathDbError>) -> bool {
        self.settle(Err(err.into()))
    }

    /// Rejects with [`PathDbError::Canceled`].
    pub fn cancel(self) -> bool {
        self.settle(Err(PathDbError::Canceled))
    }
}

/// An eventual result whose resolver is exposed to its creator.
#[derive(Debug)]
pub struct OpenPromise<T> {
    resolver: Resolver<T>,
    eventual: Eventual<T>,
}

impl<T> Default for OpenPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OpenPromise<T> {
    /// Creates an unsettled promise.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            resolver: Resolver { tx },
            eventual: Eventual { rx },
        }
    }

    /// Splits into the settling and the waiting halves.
    #[must_use]
    pub fn split(self) -> (Resolver<T>, Eventual<T>) {
        (self.resolver, self.eventual)
    }

    /// Resolves and returns the waiting half.
    #[must_use]
    pub fn resolve(self, value: T) -> Eventual<T> {
        self.resolver.resolve(value);
        self.eventual
    }

    /// Rejects and returns the waiting half.
    #[must_use]
    pub fn reject(self, err: impl Into<PathDbError>) -> Eventual<T> {
        self.resolver.reject(err);
        self.eventual
    }

    /// Cancels and returns the waiting half.
    #[must_use]
    pub fn cancel(self) -> Eventual<T> {
        self.resolver.cancel();
        self.eventual
    }
}

/// Uniform conversion of handler return values into an [`Eventual`].
pub trait IntoEventual<T> {
    /// Wraps `self` as an eventual result.
    fn into_eventual(self) -> Eventual<T>;
}

impl<T> IntoEventual<T> for Eventual<T> {
    fn into_eventual(self) -> Eventual<T> {
        self
    }
}

impl<T> IntoEventual<T> for PathDbResult<T> {
    fn into_eventual(self) -> Eventual<T> {
        Eventual::ready(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::error::StateError;

    #[test]
    fn ready_values_are_immediately_available() {
        let ev = Eventual::ok(7);
        assert!(ev.is_settled());
        assert_eq!(ev.wait().unwrap(), 7);

        let ev: Eventual<()> = Eventual::err(StateError::AlreadyCommitted);
        assert!(ev.wait().unwrap_err().is_state());
    }

    #[test]
    fn resolver_settles_from_another_thread() {
        let (resolver, eventual) = OpenPromise::new().split();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            resolver.resolve("done".to_string())
        });
        assert_eq!(eventual.wait().unwrap(), "done");
        assert!(handle.join().unwrap());
    }

    #[test]
    fn cancel_is_distinguishable_from_failure() {
        let ev: Eventual<u8> = OpenPromise::new().cancel();
        let err = ev.wait().unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(err, PathDbError::Canceled);

        let ev: Eventual<u8> = OpenPromise::new().reject(PathDbError::internal("boom"));
        assert!(!ev.wait().unwrap_err().is_canceled());
    }

    #[test]
    fn dropped_resolver_reports_disconnected() {
        let (resolver, eventual) = OpenPromise::<u8>::new().split();
        drop(resolver);
        let err = eventual.wait().unwrap_err();
        assert!(matches!(err, PathDbError::Transport(TransportError::Disconnected { .. })));
    }

    #[test]
    fn wait_timeout_does_not_consume() {
        let (resolver, eventual) = OpenPromise::new().split();
        let err = eventual.wait_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, PathDbError::Transport(TransportError::Timeout { duration_ms: 5 })));
        assert!(eventual.try_take().is_none());

        resolver.resolve(1u32);
        assert_eq!(eventual.wait_timeout(Duration::from_millis(5)).unwrap(), 1);
    }

    #[test]
    fn into_eventual_wraps_plain_results() {
        let plain: PathDbResult<i32> = Ok(3);
        let ev: Eventual<i32> = plain.into_eventual();
        assert_eq!(ev.wait().unwrap(), 3);
        let ev: Eventual<i32> = Eventual::ok(4).into_eventual();
        assert_eq!(ev.wait().unwrap(), 4);
    }
}
