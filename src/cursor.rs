use std::fmt;
use std::marker::PhantomData;
use std::mem;

use crate::{HandoffList, NodeId};

/// A position in a [`HandoffList`], holding the lock of the node it is on.
///
/// A cursor only exists while positioned. Moving past the tail or removing
/// the node consumes it, and dropping it releases the lock.
pub struct Cursor<'a, T> {
    list: &'a HandoffList<T>,
    node: NodeId,
    /// Opts out of the auto traits; the impls below follow `MutexGuard`.
    _marker: PhantomData<*const ()>,
}

// SAFETY: the lock may be released from any thread, and moving the cursor
// moves exclusive access to the payload with it.
unsafe impl<T: Send> Send for Cursor<'_, T> {}

// SAFETY: a shared cursor only hands out `&T`, so sharing it needs `T: Sync`.
unsafe impl<T: Send + Sync> Sync for Cursor<'_, T> {}

impl<'a, T> Cursor<'a, T> {
    /// `node` must be locked on behalf of the new cursor.
    pub(crate) fn new(list: &'a HandoffList<T>, node: NodeId) -> Self {
        Cursor {
            list,
            node,
            _marker: PhantomData,
        }
    }

    /// Arena index of the node under the cursor.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn value(&self) -> &T {
        // SAFETY: the cursor holds the node's lock.
        unsafe { self.list.held_value(self.node) }
    }

    /// Moves to the successor, locking it before letting go of the current
    /// node. Returns `None`, with no lock held, after the tail.
    pub fn advance(self) -> Option<Self> {
        let (list, node) = self.into_parts();
        // SAFETY: the lock travels with the position.
        let next = unsafe { list.next_from(node) }?;
        Some(Cursor::new(list, next))
    }

    /// Unlinks the node under the cursor and returns its payload.
    pub fn remove(self) -> T {
        let (list, node) = self.into_parts();
        // SAFETY: the lock travels with the position.
        unsafe { list.unlink(node) }
    }

    fn into_parts(self) -> (&'a HandoffList<T>, NodeId) {
        let parts = (self.list, self.node);
        mem::forget(self);
        parts
    }
}

impl<T> Drop for Cursor<'_, T> {
    fn drop(&mut self) {
        // SAFETY: a live cursor always holds its node's lock.
        unsafe { self.list.release(self.node) }
    }
}

impl<T: fmt::Debug> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("node", &self.node)
            .field("value", self.value())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use static_assertions::{assert_impl_all, assert_not_impl_any};
    use std::cell::Cell;
    use std::rc::Rc;

    assert_impl_all!(Cursor<'static, String>: Send, Sync);
    assert_impl_all!(Cursor<'static, Cell<u64>>: Send);
    assert_not_impl_any!(Cursor<'static, Cell<u64>>: Sync);
    assert_not_impl_any!(Cursor<'static, Rc<u64>>: Send, Sync);
}
