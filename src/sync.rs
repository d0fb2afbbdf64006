//! Synchronization primitives abstraction for loom testing compatibility.
//!
//! Production code uses `parking_lot::Mutex` and `std::sync::Arc`; under
//! `RUSTFLAGS="--cfg loom"` the same names resolve to `loom::sync`, so the loom model
//! checker can explore every interleaving of code built on them.
//!
//! Import from this module instead of directly from `parking_lot` or `std::sync`:
//!
//! ```ignore
//! use crate::sync::{Arc, Mutex};
//! ```
//!
//! Loom tests live in the isolated `loom-tests/` crate:
//!
//! ```bash
//! cd loom-tests
//! RUSTFLAGS="--cfg loom" cargo test --release
//! ```

// ============================================================================
// LOOM CONFIGURATION
// ============================================================================

/// When running under loom (`RUSTFLAGS="--cfg loom"`), use loom's types
#[cfg(loom)]
pub(crate) mod inner {
    pub use loom::sync::Arc;

    /// `loom::sync::Mutex` with the `parking_lot` signature: `lock` cannot fail.
    #[derive(Debug, Default)]
    pub struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        #[allow(clippy::unwrap_used)] // a poisoned loom mutex means the model already panicked
        pub fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
            self.0.lock().unwrap()
        }
    }
}

/// In production, use parking_lot for performance
#[cfg(not(loom))]
pub(crate) mod inner {
    pub use parking_lot::Mutex;
    pub use std::sync::Arc;
}

pub(crate) use inner::*;

// ============================================================================
// TESTS
// ============================================================================
