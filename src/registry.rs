//! Accessor-keyed positions.
//!
//! This is the thread-keyed form of traversal: callers name themselves with an
//! [`AccessorId`] and the list remembers which node each accessor holds. The
//! registry map is locked only to read or write an entry, never while waiting
//! on a node lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::sync::{self, Mutex, MutexGuard};
use crate::{AccessError, HandoffList, NodeId};

static NEXT_ACCESSOR: AtomicU64 = AtomicU64::new(1);

/// Identity under which an accessor's position is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessorId(u64);

impl AccessorId {
    pub const fn new(raw: u64) -> Self {
        AccessorId(raw)
    }

    /// Identity of the calling thread, allocated on first use.
    pub fn current() -> Self {
        sync::thread_local! {
            static CURRENT: AccessorId = AccessorId(NEXT_ACCESSOR.fetch_add(1, Ordering::Relaxed));
        }
        CURRENT.with(|id| *id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "accessor #{}", self.0)
    }
}

/// Maps each positioned accessor to the node whose lock it holds.
pub(crate) struct Registry {
    positions: Mutex<HashMap<AccessorId, NodeId>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            positions: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<AccessorId, NodeId>> {
        self.positions.lock()
    }

    pub(crate) fn contains(&self, who: AccessorId) -> bool {
        self.entries().contains_key(&who)
    }

    pub(crate) fn record(&self, who: AccessorId, node: NodeId) {
        let previous = self.entries().insert(who, node);
        debug_assert!(previous.is_none(), "{who} recorded twice");
    }

    pub(crate) fn take(&self, who: AccessorId) -> Result<NodeId, AccessError> {
        self.entries()
            .remove(&who)
            .ok_or(AccessError::NotPositioned(who))
    }
}

impl<T> HandoffList<T> {
    /// Positions `who` on the head and returns its value, or `None` if the
    /// list is empty, in which case no position is recorded.
    pub fn try_begin(&self, who: AccessorId) -> Result<Option<T>, AccessError>
    where
        T: Clone,
    {
        if self.positions.contains(who) {
            return Err(AccessError::AlreadyPositioned(who));
        }
        let Some(node) = self.enter() else {
            return Ok(None);
        };
        // SAFETY: `enter` locked `node` for us.
        let value = unsafe { self.held_value(node) }.clone();
        self.positions.record(who, node);
        trace!(%who, node, "accessor positioned");
        Ok(Some(value))
    }

    /// Hand-over-hand step to the next node. At the end the position is
    /// cleared and `None` returned.
    pub fn try_advance(&self, who: AccessorId) -> Result<Option<T>, AccessError>
    where
        T: Clone,
    {
        let held = self.positions.take(who)?;
        // SAFETY: a registry entry means `who` holds the node's lock.
        let Some(node) = (unsafe { self.next_from(held) }) else {
            trace!(%who, "accessor reached the end");
            return Ok(None);
        };
        // SAFETY: `next_from` locked `node` for us.
        let value = unsafe { self.held_value(node) }.clone();
        self.positions.record(who, node);
        Ok(Some(value))
    }

    /// Deletes the node `who` is positioned on and returns its value. The
    /// position is cleared.
    pub fn try_remove_here(&self, who: AccessorId) -> Result<T, AccessError> {
        let held = self.positions.take(who)?;
        // SAFETY: a registry entry means `who` holds the node's lock.
        Ok(unsafe { self.unlink(held) })
    }

    /// Gives up the position of `who` without deleting anything.
    pub fn try_leave(&self, who: AccessorId) -> Result<(), AccessError> {
        let held = self.positions.take(who)?;
        // SAFETY: a registry entry means `who` holds the node's lock.
        unsafe { self.release(held) };
        Ok(())
    }

    /// Like [`try_begin`](Self::try_begin), panicking if `who` is already
    /// positioned.
    #[track_caller]
    pub fn begin(&self, who: AccessorId) -> Option<T>
    where
        T: Clone,
    {
        match self.try_begin(who) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`try_advance`](Self::try_advance), panicking if `who` is not
    /// positioned.
    #[track_caller]
    pub fn advance(&self, who: AccessorId) -> Option<T>
    where
        T: Clone,
    {
        match self.try_advance(who) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`try_remove_here`](Self::try_remove_here), panicking if `who` is
    /// not positioned.
    #[track_caller]
    pub fn remove_here(&self, who: AccessorId) -> T {
        match self.try_remove_here(who) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    #[track_caller]
    pub fn leave(&self, who: AccessorId) {
        if let Err(err) = self.try_leave(who) {
            panic!("{err}");
        }
    }

    /// Whether `who` currently holds a position.
    pub fn positioned(&self, who: AccessorId) -> bool {
        self.positions.contains(who)
    }
}
