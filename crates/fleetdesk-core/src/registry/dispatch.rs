//! Isolated callback invocation.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::error;

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Invoke each callback in order. A panicking callback is logged and skipped;
/// the rest still run. Returns the number of callbacks that panicked.
pub(crate) fn invoke_all<T>(callbacks: &[Callback<T>], value: &T, label: &str) -> usize {
    let mut failed = 0;
    for (index, callback) in callbacks.iter().enumerate() {
        if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
            failed += 1;
            error!("Callback {} for {} panicked; continuing with remaining callbacks", index, label);
        }
    }
    failed
}
