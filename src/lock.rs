//! Per-node locks and the multi-lock used when unlinking.
//!
//! Traversal takes node locks one at a time in list order (hand-over-hand).
//! Unlinking needs up to three locks at once: previous, target and next.
//! [`lock_all`] takes them as a unit with the try-and-back-off scheme: block on
//! one lock, try the others, and on any failure drop everything taken in this
//! round before blocking again on the lock that was busy. A caller of
//! `lock_all` never waits while holding a lock, so it cannot close a wait cycle
//! with a traverser or with another `lock_all` caller, whatever order either
//! side names the locks in.

use crate::sync::{self, RawLock};

/// Exclusive lock guarding one node's links and payload.
pub(crate) struct NodeLock {
    raw: RawLock,
}

impl NodeLock {
    pub(crate) fn new() -> Self {
        NodeLock {
            raw: RawLock::new(),
        }
    }

    pub(crate) fn lock(&self) {
        self.raw.lock();
    }

    pub(crate) fn try_lock(&self) -> bool {
        self.raw.try_lock()
    }

    /// # Safety
    ///
    /// The caller must hold the lock.
    pub(crate) unsafe fn unlock(&self) {
        self.raw.unlock();
    }
}

/// Acquires every lock in `locks` without risking a circular wait.
///
/// The locks must be distinct.
pub(crate) fn lock_all(locks: &[&NodeLock]) {
    if locks.is_empty() {
        return;
    }
    let mut first = 0;
    loop {
        locks[first].lock();
        match try_rest(locks, first) {
            None => return,
            Some(busy) => {
                first = busy;
                sync::yield_now();
            }
        }
    }
}

/// Releases every lock in `locks`.
///
/// # Safety
///
/// The caller must hold all of them.
pub(crate) unsafe fn unlock_all(locks: &[&NodeLock]) {
    for lock in locks {
        lock.unlock();
    }
}

/// Tries every lock but `first`, which the caller holds. On failure all locks
/// taken so far, `first` included, are released and the busy index returned.
fn try_rest(locks: &[&NodeLock], first: usize) -> Option<usize> {
    for (i, lock) in locks.iter().enumerate() {
        if i == first || lock.try_lock() {
            continue;
        }
        for (j, held) in locks[..i].iter().enumerate() {
            if j != first {
                // SAFETY: taken by `try_lock` earlier in this round.
                unsafe { held.unlock() };
            }
        }
        // SAFETY: taken by `lock_all` before calling us.
        unsafe { locks[first].unlock() };
        return Some(i);
    }
    None
}

#[cfg(all(test, not(feature = "shuttle")))]
mod test {
    use super::*;
    use std::cell::UnsafeCell;
    use std::thread;

    struct Shared(UnsafeCell<u64>);

    unsafe impl Sync for Shared {}

    #[test]
    fn test_lock_all_takes_every_lock() {
        let (a, b, c) = (NodeLock::new(), NodeLock::new(), NodeLock::new());
        let set = [&a, &b, &c];
        lock_all(&set);
        assert!(!a.try_lock());
        assert!(!b.try_lock());
        assert!(!c.try_lock());
        unsafe { unlock_all(&set) };
        assert!(a.try_lock() && b.try_lock() && c.try_lock());
        unsafe { unlock_all(&set) };
    }

    #[test]
    fn test_lock_all_empty_set() {
        lock_all(&[]);
        unsafe { unlock_all(&[]) };
    }

    #[test]
    fn test_failed_round_releases_partial_set() {
        let (a, b, c) = (NodeLock::new(), NodeLock::new(), NodeLock::new());
        c.lock();
        a.lock();
        assert_eq!(try_rest(&[&a, &b, &c], 0), Some(2));
        // `a` and `b` were released, `c` still belongs to us.
        assert!(a.try_lock());
        assert!(b.try_lock());
        assert!(!c.try_lock());
        unsafe { unlock_all(&[&a, &b, &c]) };
    }

    #[test]
    fn test_opposite_orders_do_not_deadlock() {
        let locks: Vec<NodeLock> = (0..3).map(|_| NodeLock::new()).collect();
        let counter = Shared(UnsafeCell::new(0));
        let iterations = 10_000;
        thread::scope(|scope| {
            for reversed in [false, true] {
                let locks = &locks;
                let counter = &counter;
                scope.spawn(move || {
                    let mut set: Vec<&NodeLock> = locks.iter().collect();
                    if reversed {
                        set.reverse();
                    }
                    for _ in 0..iterations {
                        lock_all(&set);
                        // SAFETY: every lock is held, so access is exclusive.
                        unsafe { *counter.0.get() += 1 };
                        unsafe { unlock_all(&set) };
                    }
                });
            }
        });
        assert_eq!(counter.0.into_inner(), 2 * iterations);
    }
}
