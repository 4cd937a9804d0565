use thiserror::Error;

use crate::{AccessorId, NodeId};

/// Misuse of the accessor-keyed API. These are caller bugs; the non-`try`
/// operations panic with this message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("{0} already holds a position; advance to the end, remove or leave first")]
    AlreadyPositioned(AccessorId),
    #[error("{0} holds no position; call begin first")]
    NotPositioned(AccessorId),
}

/// A broken structural invariant found by
/// [`HandoffList::check_integrity`](crate::HandoffList::check_integrity).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("node {node} has prev {found:?}, expected {expected:?}")]
    BrokenBackLink {
        node: NodeId,
        expected: Option<NodeId>,
        found: Option<NodeId>,
    },
    #[error("node {node} is reachable but not linked")]
    UnlinkedReachable { node: NodeId },
    #[error("chain revisits node {node}")]
    Cycle { node: NodeId },
    #[error("length is {recorded} but {reachable} nodes are reachable")]
    LengthMismatch { recorded: usize, reachable: usize },
}

/// Invalid scenario configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid value")]
    Invalid { var: &'static str, value: String },
    #[error("word length range {min}..={max} is empty")]
    LengthRange { min: usize, max: usize },
}
