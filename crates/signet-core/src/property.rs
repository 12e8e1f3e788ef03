//! Reactive property cells for kernel objects.
//!
//! Slots are invoked through `&self`, so object state lives in
//! interior-mutable cells. [`Property<T>`] wraps a value with change
//! detection: `set` reports whether the value actually changed, which is
//! what a typed setter uses to decide whether to emit its notify signal.
//!
//! # Example
//!
//! ```ignore
//! struct Counter {
//!     base: ObjectBase,
//!     value: Property<i32>,
//! }
//!
//! impl Counter {
//!     fn set_value(&self, v: i32) {
//!         if self.value.set(v) {
//!             self.emit_signal("value_changed", &[Value::from(v)]);
//!         }
//!     }
//! }
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A value cell with interior mutability and change detection.
///
/// `Property<T>` is `Send + Sync` when `T` is, so objects holding properties
/// can be shared across threads and driven through queued slot invocations.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, use [`with`](Self::with).
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change detection.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if it actually changed.
    ///
    /// The caller emits the associated notify signal when this returns
    /// `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the previous one if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("value", &self.get()).finish()
    }
}
