//! Synchronization primitives used by the list.
//!
//! Regular builds use `parking_lot` and the standard atomics. With the
//! `shuttle` feature the same names resolve to shuttle's instrumented types so
//! that its schedulers see every lock acquisition and atomic access, and so
//! that thread-local state is per shuttle thread rather than per OS thread.

pub(crate) use self::imp::{thread_local, yield_now, AtomicUsize, Mutex, MutexGuard, RawLock};

#[cfg(not(feature = "shuttle"))]
mod imp {
    use parking_lot::lock_api::RawMutex as _;

    pub(crate) use parking_lot::{Mutex, MutexGuard};
    pub(crate) use std::sync::atomic::AtomicUsize;
    pub(crate) use std::thread::yield_now;
    pub(crate) use std::thread_local;

    /// An exclusive lock without a guard, so it can stay held across calls.
    pub(crate) struct RawLock(parking_lot::RawMutex);

    impl RawLock {
        pub(crate) fn new() -> Self {
            RawLock(parking_lot::RawMutex::INIT)
        }

        pub(crate) fn lock(&self) {
            self.0.lock();
        }

        pub(crate) fn try_lock(&self) -> bool {
            self.0.try_lock()
        }

        /// # Safety
        ///
        /// The lock must be held. It may have been taken on another thread.
        pub(crate) unsafe fn unlock(&self) {
            self.0.unlock();
        }
    }
}

#[cfg(feature = "shuttle")]
mod imp {
    use std::sync::atomic::Ordering;
    use std::sync::PoisonError;

    pub(crate) use shuttle::sync::atomic::AtomicUsize;
    pub(crate) use shuttle::sync::MutexGuard;
    pub(crate) use shuttle::thread::yield_now;
    pub(crate) use shuttle::thread_local;

    use shuttle::sync::atomic::AtomicBool;

    /// Poison-free wrapper matching the `parking_lot` API.
    pub(crate) struct Mutex<T>(shuttle::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Mutex(shuttle::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Spin lock that yields to the shuttle scheduler while contended.
    pub(crate) struct RawLock(AtomicBool);

    impl RawLock {
        pub(crate) fn new() -> Self {
            RawLock(AtomicBool::new(false))
        }

        pub(crate) fn lock(&self) {
            while !self.try_lock() {
                yield_now();
            }
        }

        pub(crate) fn try_lock(&self) -> bool {
            self.0
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        }

        /// # Safety
        ///
        /// The lock must be held. It may have been taken on another thread.
        pub(crate) unsafe fn unlock(&self) {
            self.0.store(false, Ordering::Release);
        }
    }
}
