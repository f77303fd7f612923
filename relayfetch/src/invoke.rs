//! Protected callback invocation.
//!
//! Callbacks handed to the engine run on threads the caller does not own:
//! the main-thread drain, the worker pool. A panic inside one of them must
//! never unwind into those loops. [`guarded`] runs a closure, catches a panic
//! and logs it. [`CallbackSlot`] tracks whether a one-shot callback is still
//! armed so it can be handed out at most once.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

/// Runs `f`, catching and logging a panic.
///
/// Returns `true` when the callback returned normally.
pub fn guarded<F: FnOnce()>(title: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                title = title,
                panic = %panic_message(payload.as_ref()),
                "Callback panicked"
            );
            false
        }
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Delivery state of a one-shot callback.
pub enum CallbackSlot<T> {
    /// Registered and not yet handed out.
    Armed(T),
    /// Handed out for delivery.
    Fired,
    /// Dropped before delivery.
    Released,
}

impl<T> CallbackSlot<T> {
    /// Slot holding `callback`, or an already released slot for `None`.
    pub fn new(callback: Option<T>) -> Self {
        match callback {
            Some(callback) => Self::Armed(callback),
            None => Self::Released,
        }
    }

    /// Takes the callback for delivery, leaving the slot `Fired`.
    ///
    /// Returns `None` if it was already fired or released.
    pub fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Self::Fired) {
            Self::Armed(callback) => Some(callback),
            other => {
                *self = other;
                None
            }
        }
    }

    /// Drops an armed callback. A fired slot stays fired.
    pub fn release(&mut self) {
        if self.is_armed() {
            *self = Self::Released;
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed(_))
    }
}

impl<T> std::fmt::Debug for CallbackSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Armed(_) => f.write_str("Armed"),
            Self::Fired => f.write_str("Fired"),
            Self::Released => f.write_str("Released"),
        }
    }
}
