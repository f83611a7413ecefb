// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The handle a controller uses to talk back to its presenter.

use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Error;
use crate::node::NodeState;
use crate::presenter::Shared;
use crate::router;
use crate::types::{Args, NodeId, PresentFlags, UnitKind};

/// A node's view of its presenter.
///
/// Handed to the controller at construction. It holds only a weak reference,
/// so a controller keeping its context alive does not keep the presenter
/// alive; once the presenter is dropped, mutating calls fail with
/// [`Error::Disposed`].
#[derive(Clone)]
pub struct PresentContext {
    shared: Weak<Shared>,
    node: NodeId,
}

impl fmt::Debug for PresentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentContext")
            .field("node", &self.node)
            .field("attached", &(self.shared.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl PresentContext {
    pub(crate) fn new(shared: Weak<Shared>, node: NodeId) -> Self {
        Self { shared, node }
    }

    fn shared(&self) -> Result<Rc<Shared>, Error> {
        self.shared.upgrade().ok_or(Error::Disposed)
    }

    /// The node this context belongs to.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// Present a child of this node.
    ///
    /// With [`PresentFlags::SET`] the new node replaces this one instead.
    pub fn present(
        &self,
        kind: impl Into<UnitKind>,
        args: Args,
        flags: PresentFlags,
    ) -> Result<NodeId, Error> {
        self.shared()?
            .present(Some(self.node), kind.into(), args, flags)
    }

    /// Dismiss this node and its descendants.
    pub fn dismiss(&self) -> Result<(), Error> {
        self.shared()?.dismiss(self.node)
    }

    /// Current state of this node.
    pub fn state(&self) -> Option<NodeState> {
        self.shared.upgrade()?.state_of(self.node)
    }

    /// Whether this node is the active node.
    pub fn is_active(&self) -> bool {
        self.state() == Some(NodeState::Active)
    }

    /// Whether this node was dismissed, including a present canceled before
    /// its view arrived and a presenter that no longer exists.
    pub fn is_dismissed(&self) -> bool {
        self.shared
            .upgrade()
            .is_none_or(|shared| shared.is_dismissed(self.node))
    }

    /// Route a command through the whole stack, as
    /// [`Presenter::invoke_command`](crate::Presenter::invoke_command) does.
    pub fn invoke_command(&self, name: &str, args: &dyn Any) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| router::route(&shared, name, args))
    }
}
