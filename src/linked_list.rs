use std::cell::UnsafeCell;

use crate::lock::NodeLock;
use crate::{Cursor, HandoffList, NodeId};

/// Lifecycle of an arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// Reachable from the head.
    Linked,
    /// Claimed by a deleter that is collecting its neighbours' locks.
    /// Traversers step past such nodes instead of resting on them.
    Unlinking,
    /// Unreachable and reclaimed. The payload is gone.
    Removed,
}

/// The lock-protected part of a node.
pub(crate) struct Slot<T> {
    pub(crate) value: Option<T>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) state: NodeState,
}

impl<T> Slot<T> {
    pub(crate) fn value(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("payload of a reclaimed node"),
        }
    }
}

/// An arena entry: a slot and the lock that guards it.
pub(crate) struct Node<T> {
    pub(crate) lock: NodeLock,
    slot: UnsafeCell<Slot<T>>,
}

impl<T> Node<T> {
    pub(crate) fn new(value: T, prev: Option<NodeId>, next: Option<NodeId>) -> Self {
        Node {
            lock: NodeLock::new(),
            slot: UnsafeCell::new(Slot {
                value: Some(value),
                prev,
                next,
                state: NodeState::Linked,
            }),
        }
    }

    /// # Safety
    ///
    /// The caller must hold `self.lock`.
    pub(crate) unsafe fn slot(&self) -> &Slot<T> {
        &*self.slot.get()
    }

    /// # Safety
    ///
    /// The caller must hold `self.lock` and keep no other reference into the
    /// slot alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self) -> &mut Slot<T> {
        &mut *self.slot.get()
    }

    pub(crate) fn get_mut(&mut self) -> &mut Slot<T> {
        self.slot.get_mut()
    }
}

/// Hand-over-hand iterator over a [`HandoffList`], yielding cloned payloads.
///
/// Between calls to `next` the iterator keeps the lock of the node it last
/// yielded, so a deleter waiting on that node blocks until the iterator moves
/// on or is dropped.
pub struct Iter<'a, T> {
    list: &'a HandoffList<T>,
    cursor: Option<Cursor<'a, T>>,
    started: bool,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(list: &'a HandoffList<T>) -> Self {
        Iter {
            list,
            cursor: None,
            started: false,
        }
    }
}

impl<'a, T: Clone> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.started {
            self.cursor = self.cursor.take()?.advance();
        } else {
            self.started = true;
            self.cursor = self.list.cursor();
        }
        self.cursor.as_ref().map(|cursor| cursor.value().clone())
    }
}
