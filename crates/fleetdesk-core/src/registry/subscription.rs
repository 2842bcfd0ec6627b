//! Disposer handle returned by every registration.

use std::fmt;

/// Handle whose disposal removes a registration.
///
/// The handle is consumed by [`Subscription::dispose`], so a registration can
/// only be removed once.
#[must_use = "dropping a Subscription keeps the registration alive; call dispose() to remove it"]
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `disposer` when disposed.
    pub fn new<F>(disposer: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// A subscription with nothing to undo.
    pub fn noop() -> Self {
        Self { disposer: None }
    }

    /// Remove the registration.
    pub fn dispose(mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispose_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.dispose();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_does_not_dispose() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_noop_debug() {
        let sub = Subscription::noop();
        assert!(format!("{:?}", sub).contains("active: false"));
        sub.dispose();
    }
}
