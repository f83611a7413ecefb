// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the presenter: node identifiers, present flags, unit kinds, and placement hints.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

/// Identifier for a presented node.
///
/// Ids are allocated from a per-presenter counter that only grows, so an id is
/// never reused for a different node, even after the node is disposed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags::bitflags! {
    /// Options supplied with a present request.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PresentFlags: u8 {
        /// Commands never propagate below this node.
        const MODAL           = 0b0000_0001;
        /// Nodes below this one are obscured.
        const EXCLUSIVE       = 0b0000_0010;
        /// Forwarded to the view factory; the view is shown as a popup.
        const POPUP           = 0b0000_0100;
        /// The node is presented but never becomes active.
        const DO_NOT_ACTIVATE = 0b0000_1000;
        /// The node replaces the node it is presented from instead of stacking on it.
        const SET             = 0b0001_0000;
        /// The whole stack is dismissed before the node is pushed.
        const RESET           = 0b0010_0000;
    }
}

/// Identifier of a constructible unit type, as understood by the
/// [`ControllerFactory`](crate::ControllerFactory).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct UnitKind(Cow<'static, str>);

impl UnitKind {
    /// Create a kind from a static or owned name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The kind's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty; empty kinds are never constructible.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for UnitKind {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for UnitKind {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque arguments handed to the controller factory on present.
pub type Args = Box<dyn Any>;

/// Empty [`Args`].
pub fn no_args() -> Args {
    Box::new(())
}

/// Where a node's view will be shown, handed to the [`ViewFactory`](crate::ViewFactory).
///
/// This is computed when the view is requested. If other nodes are presented
/// while the request is outstanding, the final position may sit higher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewPlacement {
    /// Node the view belongs to.
    pub node: NodeId,
    /// Unit kind of the node.
    pub kind: UnitKind,
    /// Parent the node will be linked under.
    pub parent: Option<NodeId>,
    /// Node the view will sit directly above, or `None` for the bottom of the stack.
    pub above: Option<NodeId>,
    /// Number of ancestors.
    pub depth: usize,
}
