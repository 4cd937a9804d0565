//! A doubly-linked list with per-node locks, traversed hand-over-hand and
//! pruned concurrently.
//!
//! Randomized schedule exploration lives in `tests/concurrency_test.rs` and
//! only runs against the shuttle-instrumented primitives:
//!
//! ```text
//! cargo test --features shuttle --test concurrency_test
//! ```
//!
//! A plain `cargo test` runs the unit tests and the std-thread stress tests.

mod cursor;
mod error;
mod linked_list;
mod lock;
mod registry;
pub mod scenario;
mod sync;

pub use crate::cursor::Cursor;
pub use crate::error::{AccessError, ConfigError, IntegrityError};
pub use crate::linked_list::Iter;
pub use crate::registry::AccessorId;

use crate::linked_list::{Node, NodeState};
use crate::lock::{lock_all, unlock_all, NodeLock};
use crate::registry::Registry;
use crate::sync::AtomicUsize;
use std::fmt;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// Index of a node in the list's arena. Indices are never reused.
pub type NodeId = usize;

/// `head` value of an empty list.
const NIL: NodeId = usize::MAX;

/// A doubly-linked list that allows concurrent traversal and deletion.
///
/// There is no list-wide lock. Every node has its own lock. Traversal is
/// hand-over-hand: a reader locks the next node before it lets go of the
/// current one. A deleter locks the target together with both neighbours
/// as one unit. The node set is fixed by [`build`]; afterwards
/// nodes can only be removed.
///
/// [`build`]: HandoffList::build
pub struct HandoffList<T> {
    /// Every node ever built. Removed nodes keep their slot.
    nodes: Box<[Node<T>]>,
    /// Arena index of the first node, or `NIL`.
    head: AtomicUsize,
    /// Number of nodes not yet removed.
    len: AtomicUsize,
    /// Positions of accessors using the id-keyed API.
    positions: Registry,
}

// SAFETY: slot contents are only touched under the owning node's lock, or
// through `&mut self`.
unsafe impl<T: Send> Sync for HandoffList<T> {}

impl<T> HandoffList<T> {
    pub fn new() -> Self {
        Self::build(Vec::new())
    }

    /// Builds the list by inserting each value at the head in turn.
    ///
    /// The resulting order is the reverse of `values`: the last value ends up
    /// at the head.
    pub fn build<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        let count = values.len();
        let nodes: Box<[Node<T>]> = values
            .into_iter()
            .enumerate()
            .map(|(id, value)| {
                let prev = (id + 1 < count).then_some(id + 1);
                let next = id.checked_sub(1);
                Node::new(value, prev, next)
            })
            .collect();
        let head = count.checked_sub(1).unwrap_or(NIL);
        debug!(len = count, "list built");
        HandoffList {
            nodes,
            head: AtomicUsize::new(head),
            len: AtomicUsize::new(count),
            positions: Registry::new(),
        }
    }

    /// Number of live nodes. Only a snapshot while other threads delete.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positions a cursor on the head, or returns `None` if the list is empty.
    pub fn cursor(&self) -> Option<Cursor<'_, T>> {
        let node = self.enter()?;
        Some(Cursor::new(self, node))
    }

    /// Traverses the list hand-over-hand, yielding a clone of each value.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id]
    }

    /// Locks the head and returns it, or `None` when the list is empty.
    pub(crate) fn enter(&self) -> Option<NodeId> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            if head == NIL {
                return None;
            }
            let node = self.node(head);
            node.lock.lock();
            // SAFETY: locked just above.
            let slot = unsafe { node.slot() };
            if slot.state != NodeState::Removed && slot.prev.is_none() {
                // SAFETY: we hold `head`.
                return unsafe { self.settle(head) };
            }
            // SAFETY: locked just above.
            unsafe { node.lock.unlock() };
            trace!(node = head, "head removed before it was locked, retrying");
            sync::yield_now();
        }
    }

    /// Moves the position from `held` to its successor, skipping nodes that
    /// are being unlinked. `None` means the end was reached and nothing is
    /// locked any more.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock of `held`; ownership of it passes to
    /// this call.
    pub(crate) unsafe fn next_from(&self, held: NodeId) -> Option<NodeId> {
        let next = self.step(held)?;
        self.settle(next)
    }

    /// # Safety
    ///
    /// As for [`next_from`](Self::next_from).
    unsafe fn settle(&self, mut held: NodeId) -> Option<NodeId> {
        while self.node(held).slot().state == NodeState::Unlinking {
            trace!(node = held, "stepping over node being unlinked");
            held = self.step(held)?;
        }
        Some(held)
    }

    /// A single hand-over-hand step: the successor is locked before `held`
    /// is released, so the edge between them cannot be cut in between.
    ///
    /// # Safety
    ///
    /// As for [`next_from`](Self::next_from).
    unsafe fn step(&self, held: NodeId) -> Option<NodeId> {
        let node = self.node(held);
        let next = node.slot().next;
        if let Some(next) = next {
            self.node(next).lock.lock();
            debug_assert_ne!(self.node(next).slot().state, NodeState::Removed);
        }
        node.lock.unlock();
        next
    }

    /// # Safety
    ///
    /// The caller must hold the lock of `held` for as long as the reference
    /// lives.
    pub(crate) unsafe fn held_value(&self, held: NodeId) -> &T {
        self.node(held).slot().value()
    }

    /// # Safety
    ///
    /// The caller must hold the lock of `held`.
    pub(crate) unsafe fn release(&self, held: NodeId) {
        self.node(held).lock.unlock();
    }

    /// Unlinks `target` and returns its payload.
    ///
    /// The target is marked `Unlinking` and its neighbours are read while its
    /// lock is still held. The lock is then dropped so that the target and
    /// its neighbours can be taken together with `lock_all`. If a concurrent
    /// deletion changed the neighbours in between, the attempt is retried.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock of `target`, a linked node. The lock is
    /// released by this call.
    pub(crate) unsafe fn unlink(&self, target: NodeId) -> T {
        let node = self.node(target);
        let (mut prev, mut next) = {
            let slot = node.slot_mut();
            debug_assert_eq!(slot.state, NodeState::Linked);
            slot.state = NodeState::Unlinking;
            (slot.prev, slot.next)
        };
        node.lock.unlock();

        loop {
            let mut set: [&NodeLock; 3] = [&node.lock; 3];
            let mut count = 0;
            for id in [prev, Some(target), next].into_iter().flatten() {
                set[count] = &self.node(id).lock;
                count += 1;
            }
            let set = &set[..count];
            lock_all(set);

            let slot = node.slot_mut();
            if slot.prev != prev || slot.next != next {
                trace!(node = target, "neighbours changed while unlocked, retrying");
                (prev, next) = (slot.prev, slot.next);
                unlock_all(set);
                sync::yield_now();
                continue;
            }

            match (prev, next) {
                (None, None) => self.head.store(NIL, Ordering::Release),
                (None, Some(n)) => {
                    self.node(n).slot_mut().prev = None;
                    self.head.store(n, Ordering::Release);
                }
                (Some(p), None) => self.node(p).slot_mut().next = None,
                (Some(p), Some(n)) => {
                    self.node(p).slot_mut().next = Some(n);
                    self.node(n).slot_mut().prev = Some(p);
                }
            }
            slot.state = NodeState::Removed;
            slot.prev = None;
            slot.next = None;
            let value = slot.value.take();
            let remaining = self.len.fetch_sub(1, Ordering::AcqRel) - 1;
            unlock_all(set);

            debug!(node = target, remaining, "node reclaimed");
            return match value {
                Some(value) => value,
                None => unreachable!("node {target} reclaimed twice"),
            };
        }
    }

    /// Verifies the chain with exclusive access and returns its length.
    ///
    /// Checks that every edge has a matching back-link, that the head has no
    /// predecessor, that only linked nodes are reachable, that the chain ends,
    /// and that its length matches [`len`](Self::len).
    pub fn check_integrity(&mut self) -> Result<usize, IntegrityError> {
        let head = self.head.load(Ordering::Acquire);
        let mut reachable = 0;
        let mut prev = None;
        let mut cursor = (head != NIL).then_some(head);
        while let Some(id) = cursor {
            if reachable == self.nodes.len() {
                return Err(IntegrityError::Cycle { node: id });
            }
            let slot = self.nodes[id].get_mut();
            if slot.state != NodeState::Linked {
                return Err(IntegrityError::UnlinkedReachable { node: id });
            }
            if slot.prev != prev {
                return Err(IntegrityError::BrokenBackLink {
                    node: id,
                    expected: prev,
                    found: slot.prev,
                });
            }
            reachable += 1;
            prev = Some(id);
            cursor = slot.next;
        }
        let recorded = self.len();
        if recorded != reachable {
            return Err(IntegrityError::LengthMismatch {
                recorded,
                reachable,
            });
        }
        Ok(reachable)
    }

    /// Consumes the list, returning the live values from head to tail.
    pub fn into_vec(mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len());
        let head = self.head.load(Ordering::Acquire);
        let mut cursor = (head != NIL).then_some(head);
        while let Some(id) = cursor {
            let slot = self.nodes[id].get_mut();
            values.extend(slot.value.take());
            cursor = slot.next;
        }
        values
    }
}

impl<T> Default for HandoffList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandoffList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffList")
            .field("len", &self.len())
            .field("capacity", &self.nodes.len())
            .finish_non_exhaustive()
    }
}
