//! Logout listeners.
//!
//! Listeners are invoked whenever the session ends, explicitly or because the
//! refresh budget ran out. Each runs in isolation: an error or panic in one
//! is logged and the rest still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Boxed error a listener may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Zero-argument logout callback.
pub type LogoutListener = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Handle returned by registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct LogoutListeners {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, LogoutListener)>>,
}

impl LogoutListeners {
    pub(crate) fn register(&self, listener: LogoutListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Invoke every listener once. Returns how many completed without error.
    pub(crate) fn notify(&self) -> usize {
        // Snapshot so a listener may register or remove listeners without deadlocking.
        let snapshot: Vec<(ListenerId, LogoutListener)> = self.listeners.lock().clone();

        let mut ok = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::error!(listener = id.0, error = %e, "Logout listener failed");
                }
                Err(_) => {
                    tracing::error!(listener = id.0, "Logout listener panicked");
                }
            }
        }
        ok
    }
}

impl std::fmt::Debug for LogoutListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutListeners")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, LogoutListener) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = count.clone();
        let listener: LogoutListener = Arc::new(move || {
            clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, listener)
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let listeners = LogoutListeners::default();
        let (first, l1) = counter();
        let (last, l3) = counter();

        listeners.register(l1);
        listeners.register(Arc::new(|| Err("cache flush failed".into())));
        listeners.register(Arc::new(|| panic!("listener bug")));
        listeners.register(l3);

        assert_eq!(listeners.notify(), 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener() {
        let listeners = LogoutListeners::default();
        let (count, listener) = counter();
        let id = listeners.register(listener);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert_eq!(listeners.notify(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let listeners = LogoutListeners::default();
        let a = listeners.register(Arc::new(|| Ok(())));
        let b = listeners.register(Arc::new(|| Ok(())));
        assert_ne!(a, b);
        assert_eq!(listeners.len(), 2);
    }
}
