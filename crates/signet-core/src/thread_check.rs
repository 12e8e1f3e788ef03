//! Thread-affinity tracking for kernel objects.
//!
//! Every object captures the thread it was constructed on; queued delivery
//! targets that thread, and per-object mutable state (child list, dynamic
//! properties) must only be touched from it. This module provides the
//! affinity record plus debug assertions to catch violations early.
//!
//! Runtime checks default to on in debug builds and off in release builds;
//! [`set_thread_checks_enabled`] overrides the default process-wide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

/// Flag to enable/disable runtime thread checks globally.
static THREAD_CHECKS_ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

/// Enable or disable runtime thread checks.
pub fn set_thread_checks_enabled(enabled: bool) {
    THREAD_CHECKS_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Check if runtime thread checks are currently enabled.
#[inline]
pub fn are_thread_checks_enabled() -> bool {
    THREAD_CHECKS_ENABLED.load(Ordering::Relaxed)
}

/// The thread an object belongs to, recorded at construction.
///
/// # Example
///
/// ```
/// use signet_core::thread_check::ThreadAffinity;
///
/// let affinity = ThreadAffinity::current();
/// assert!(affinity.is_same_thread());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Record the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// The thread this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the calling thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Panic if the calling thread does not match and checks are enabled.
    #[inline]
    pub fn check_same_thread(&self, what: &str) {
        if are_thread_checks_enabled() && !self.is_same_thread() {
            self.panic_wrong_thread(what);
        }
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self, what: &str) -> ! {
        let current = std::thread::current();
        panic!(
            "thread affinity violation: {what} belongs to {:?} but was accessed from \
             {:?} ({:?}); use a queued connection or post an event instead",
            self.thread_id,
            current.name().unwrap_or("<unnamed>"),
            current.id(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_same_thread() {
        let affinity = ThreadAffinity::current();
        assert!(affinity.is_same_thread());
        affinity.check_same_thread("test object");
    }

    #[test]
    fn test_affinity_different_thread() {
        let affinity = ThreadAffinity::current();
        let handle = std::thread::spawn(move || affinity.is_same_thread());
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn test_affinity_panics_cross_thread_when_enabled() {
        let affinity = ThreadAffinity::current();
        let result = std::thread::spawn(move || {
            set_thread_checks_enabled(true);
            affinity.check_same_thread("test object");
        })
        .join();
        assert!(result.is_err());
    }
}
