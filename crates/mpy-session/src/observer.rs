//! Output/state observer registries (spec.md §4.5, §5).
//!
//! Callbacks are invoked synchronously after the execution permit has been
//! released (spec.md §5: "observer callbacks are invoked synchronously after
//! the permit is released"). A [`SubscriptionHandle`] deregisters its
//! callback when dropped, so callers don't need an explicit `unsubscribe`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback<T>)>>,
}

/// A multi-subscriber broadcast point for one event type.
pub struct Observer<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Default for Observer<T> {
    fn default() -> Observer<T> {
        Observer { registry: Arc::new(Registry { next_id: AtomicU64::new(0), callbacks: Mutex::new(Vec::new()) }) }
    }
}

impl<T> Observer<T> {
    pub fn new() -> Observer<T> {
        Observer::default()
    }

    /// Register `callback`. Returns a handle that deregisters it on drop.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionHandle<T> {
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        self.registry.callbacks.lock().unwrap().push((id, Box::new(callback)));
        SubscriptionHandle { id, registry: Arc::downgrade(&self.registry) }
    }

    /// Invoke every live callback with `event`. A panicking callback is
    /// caught and ignored (spec.md §4.5: "listener exceptions are caught and
    /// ignored"), matching the rest of the session's never-let-a-listener-
    /// break-the-orchestrator contract.
    pub fn emit(&self, event: &T)
    where
        T: std::panic::RefUnwindSafe,
    {
        let callbacks = self.registry.callbacks.lock().unwrap();
        for (_, callback) in callbacks.iter() {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event)));
        }
    }
}

/// Deregisters the associated callback when dropped.
pub struct SubscriptionHandle<T> {
    id: u64,
    registry: Weak<Registry<T>>,
}

impl<T> Drop for SubscriptionHandle<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.callbacks.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}
