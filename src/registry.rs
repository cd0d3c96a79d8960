//! Active Connection Registry
//!
//! Tracks the one handler currently connected on a link so that a caller
//! outside the connection (the HTTP bridge) can find it and inject a message.
//!
//! All operations go through a single lock, so a lookup can never observe a
//! half-applied register/unregister pair. `unregister` only clears the entry
//! if it still points at the given handler: a connection that is shutting down
//! late cannot remove its replacement.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Holds at most one live handler.
pub struct ActiveConnectionRegistry<H> {
    current: Mutex<Option<Arc<H>>>,
}

impl<H> ActiveConnectionRegistry<H> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<H>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `handler` the current one, replacing any previous entry.
    pub fn register(&self, handler: Arc<H>) {
        *self.lock() = Some(handler);
    }

    /// Clears the entry if it is `handler`; otherwise does nothing.
    ///
    /// Returns whether the entry was cleared.
    pub fn unregister(&self, handler: &H) -> bool {
        let mut current = self.lock();
        match current.as_deref() {
            Some(registered) if std::ptr::eq(registered, handler) => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// The currently registered handler, if any. Never waits for one to appear.
    pub fn current(&self) -> Option<Arc<H>> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

impl<H> Default for ActiveConnectionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for ActiveConnectionRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConnectionRegistry")
            .field("registered", &!self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Handler(u32);

    #[test]
    fn test_register_and_get() {
        let registry = ActiveConnectionRegistry::new();
        assert!(registry.current().is_none());

        let handler = Arc::new(Handler(1));
        registry.register(Arc::clone(&handler));

        let current = registry.current().unwrap();
        assert!(Arc::ptr_eq(&current, &handler));
        assert_eq!(current.0, 1);
    }

    #[test]
    fn test_unregister_current() {
        let registry = ActiveConnectionRegistry::new();
        let handler = Arc::new(Handler(1));
        registry.register(Arc::clone(&handler));

        assert!(registry.unregister(&handler));
        assert!(registry.is_empty());
        assert!(!registry.unregister(&handler));
    }

    #[test]
    fn test_stale_unregister_is_ignored() {
        let registry = ActiveConnectionRegistry::new();
        let old = Arc::new(Handler(1));
        let new = Arc::new(Handler(2));

        registry.register(Arc::clone(&old));
        registry.register(Arc::clone(&new));

        // The old connection finishing late must not remove the new one
        assert!(!registry.unregister(&old));
        assert_eq!(registry.current().unwrap().0, 2);
    }

    #[test]
    fn test_concurrent_register_unregister() {
        let registry = Arc::new(ActiveConnectionRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..1000 {
                        let handler = Arc::new(Handler(i * 1000 + j));
                        registry.register(Arc::clone(&handler));
                        let _ = registry.current();
                        registry.unregister(&handler);
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
