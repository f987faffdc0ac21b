//! Typed publish/subscribe channel.
//!
//! A [`ChangeBus`] delivers every published event synchronously, on the
//! publishing thread, to each listener subscribed at the time of the call and
//! in subscription order. There is no queue and no replay: a listener only
//! sees events published after it subscribed.
//!
//! Listeners are isolated from one another. A listener that returns an error
//! or panics is reported through `tracing` and the remaining listeners still
//! receive the event; the publisher never sees the failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a fallible listener.
pub type ListenerResult = Result<(), ListenerError>;

type Listener<E> = Arc<dyn Fn(&E) -> ListenerResult + Send + Sync>;

/// Handle returned by [`ChangeBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(u64);

/// Outcome of a single [`ChangeBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Listeners that handled the event.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

/// Synchronous, ordered observer registry for events of type `E`.
pub struct ChangeBus<E> {
    listeners: Mutex<Vec<(Subscription, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E> ChangeBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener that cannot fail.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.try_subscribe(move |event| {
            listener(event);
            Ok(())
        })
    }

    /// Register a listener that may report an error.
    pub fn try_subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) -> ListenerResult + Send + Sync + 'static,
    {
        let subscription = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((subscription, Arc::new(listener)));
        subscription
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `event` to every current listener, in subscription order.
    pub fn publish(&self, event: &E) -> PublishReport {
        // Snapshot so listeners may subscribe or unsubscribe while we iterate.
        let snapshot: Vec<(Subscription, Listener<E>)> = self
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        let mut report = PublishReport::default();
        for (Subscription(id), listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(subscription = id, error = %e, "listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(subscription = id, "listener panicked");
                }
            }
        }
        report
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Subscription, Listener<E>)>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> Default for ChangeBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
