//! Ordered listener set.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::dispatch::{Callback, invoke_all};
use super::Subscription;

struct Entries<T> {
    next_id: u64,
    items: Vec<(u64, Callback<T>)>,
}

/// Listeners invoked in registration order.
///
/// Cloning shares the same set. Callbacks run outside the internal lock, so a
/// callback may register or dispose listeners on the set that invoked it.
pub struct ListenerSet<T> {
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                items: Vec::new(),
            })),
        }
    }

    /// Register a listener. Registering the same closure twice yields two
    /// independent entries.
    pub fn register<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut entries = self.entries.lock();
            let id = entries.next_id;
            entries.next_id += 1;
            entries.items.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = weak.upgrade() {
                entries.lock().items.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Deliver `value` to every listener registered at the time of the call.
    /// Returns how many listeners panicked.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .lock()
            .items
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        invoke_all(&snapshot, value, "listener set")
    }

    pub fn len(&self) -> usize {
        self.entries.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}
