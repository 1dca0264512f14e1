//! One-shot completion signal
//!
//! Connects a notification handler (producer) to a suspended driver
//! (consumer). The first `resolve` wins; later ones are ignored and every
//! waiter, early or late, sees the first value.

use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

#[derive(Debug)]
struct Inner<V> {
    value: OnceLock<V>,
    notify: Notify,
}

/// Resolve-once future shared between a handler and a driver
#[derive(Debug)]
pub struct CompletionSignal<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CompletionSignal<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for CompletionSignal<V> {
    fn default() -> Self {
        Self::create()
    }
}

impl<V> CompletionSignal<V> {
    /// A new, unresolved signal
    pub fn create() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: OnceLock::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Store `value` and wake every waiter. Returns false, leaving the first
    /// value in place, if the signal was already resolved.
    pub fn resolve(&self, value: V) -> bool {
        if self.inner.value.set(value).is_err() {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// True once a value has been stored
    pub fn is_resolved(&self) -> bool {
        self.inner.value.get().is_some()
    }
}

impl<V: Clone> CompletionSignal<V> {
    /// The stored value, without waiting
    pub fn value(&self) -> Option<V> {
        self.inner.value.get().cloned()
    }

    /// Wait for the value; returns at once if already resolved
    pub async fn await_value(&self) -> V {
        loop {
            let notified = self.inner.notify.notified();
            let mut notified = std::pin::pin!(notified);
            // register before checking so a resolve in between is not missed
            notified.as_mut().enable();

            if let Some(value) = self.inner.value.get() {
                return value.clone();
            }
            notified.await;
        }
    }
}
