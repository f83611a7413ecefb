// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node state machine.
//!
//! ```text
//! Initialized ──► Presented ◄──► Active
//!      │              │            │
//!      │              ▼            │ (deactivated first)
//!      │          Dismissed ◄──────┘
//!      │              │
//!      └────────► Disposed
//! ```
//!
//! Transitions only move forward, except for the `Presented ⇄ Active` toggle.
//! `Initialized → Disposed` is the short-circuit taken when a present is
//! abandoned before its view arrives.

use std::fmt;

use tracing::debug;

use crate::error::Stage;
use crate::factory::{Controller, Scope, ViewHandle};
use crate::types::{NodeId, PresentFlags, UnitKind};

/// Lifecycle state of a node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeState {
    /// Controller constructed, view not yet acquired; not linked into the stack.
    Initialized,
    /// Linked into the stack and visible, not receiving input.
    Presented,
    /// The single node receiving input.
    Active,
    /// Dismissal callbacks ran; teardown pending.
    Dismissed,
    /// Torn down; terminal.
    Disposed,
}

impl NodeState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Initialized, Presented)
                | (Initialized, Disposed)
                | (Presented, Active)
                | (Active, Presented)
                | (Presented, Dismissed)
                | (Dismissed, Disposed)
        )
    }

    /// `Presented` or `Active`.
    pub fn is_presented(self) -> bool {
        matches!(self, Self::Presented | Self::Active)
    }

    /// `Dismissed` or `Disposed`.
    pub fn is_dismissed(self) -> bool {
        matches!(self, Self::Dismissed | Self::Disposed)
    }
}

pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    /// Node this one replaces at commit (`SET`).
    pub(crate) replaces: Option<NodeId>,
    pub(crate) kind: UnitKind,
    pub(crate) flags: PresentFlags,
    state: NodeState,
    /// `None` while the controller is executing a callback or command.
    pub(crate) controller: Option<Box<dyn Controller>>,
    pub(crate) scope: Option<Box<dyn Scope>>,
    pub(crate) view: Option<ViewHandle>,
    /// Callbacks that fell due while the controller was checked out, oldest first.
    pub(crate) missed: Vec<Stage>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .field("checked_out", &self.controller.is_none())
            .field("missed", &self.missed)
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        parent: Option<NodeId>,
        kind: UnitKind,
        flags: PresentFlags,
        controller: Box<dyn Controller>,
        scope: Option<Box<dyn Scope>>,
    ) -> Self {
        Self {
            id,
            parent,
            replaces: None,
            kind,
            flags,
            state: NodeState::Initialized,
            controller: Some(controller),
            scope,
            view: None,
            missed: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> NodeState {
        self.state
    }

    pub(crate) fn set_state(&mut self, next: NodeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?} for node {}",
            self.state,
            next,
            self.id
        );
        debug!(node = %self.id, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    /// Whether the node may become the active node once presented.
    pub(crate) fn activatable(&self) -> bool {
        !self.flags.contains(PresentFlags::DO_NOT_ACTIVATE)
    }
}
