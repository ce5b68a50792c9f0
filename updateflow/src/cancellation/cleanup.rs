//! Cleanup registry for disposal observers.

use parking_lot::Mutex;
use tracing::warn;

/// A named cleanup callback.
struct CleanupCallback {
    /// The callback function.
    callback: Box<dyn FnOnce() + Send>,
    /// Name used in diagnostics.
    name: String,
}

/// Registry for cleanup callbacks executed in LIFO order.
///
/// Callbacks run at most once; the registry is drained by
/// [`CleanupRegistry::run_all`].
#[derive(Default)]
pub struct CleanupRegistry {
    callbacks: Mutex<Vec<CleanupCallback>>,
}

impl CleanupRegistry {
    /// Creates a new cleanup registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cleanup callback.
    pub fn register<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.lock().push(CleanupCallback {
            callback: Box::new(callback),
            name: name.into(),
        });
    }

    /// Removes every callback registered under `name`.
    ///
    /// Returns true if a callback was removed.
    pub fn unregister_by_name(&self, name: &str) -> bool {
        let mut callbacks = self.callbacks.lock();
        let initial_len = callbacks.len();
        callbacks.retain(|cb| cb.name != name);
        callbacks.len() < initial_len
    }

    /// Runs all cleanup callbacks in LIFO order.
    ///
    /// Panics are caught and collected as `(name, message)` pairs; they never
    /// stop the remaining callbacks. The registry is empty afterwards.
    pub fn run_all(&self) -> Vec<(String, String)> {
        let callbacks: Vec<CleanupCallback> = std::mem::take(&mut *self.callbacks.lock());

        let mut failures = Vec::new();
        for entry in callbacks.into_iter().rev() {
            let CleanupCallback { callback, name } = entry;
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
                let msg = format!("Cleanup callback panicked: {:?}", panic);
                warn!("{}: {}", name, msg);
                failures.push((name, msg));
            }
        }

        failures
    }

    /// Returns the number of pending cleanup callbacks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Clears all registered callbacks without running them.
    pub fn clear(&self) {
        self.callbacks.lock().clear();
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
