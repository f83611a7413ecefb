// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observable presenter events.
//!
//! The presenter queues events as operations run; the host drains them with
//! [`Presenter::take_events`](crate::Presenter::take_events). Queuing keeps
//! observers out of the mutation path, so they can never re-enter it.

use crate::error::ErrorKind;
use crate::types::{NodeId, UnitKind};

/// An event produced by a presenter operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresenterEvent {
    /// A present request was accepted and an id allocated.
    PresentInitiated {
        /// The new node.
        node: NodeId,
        /// Requested unit kind.
        kind: UnitKind,
    },
    /// A present request finished, successfully or not.
    ///
    /// For requests whose view arrives later this is emitted from
    /// [`Presenter::poll_pending`](crate::Presenter::poll_pending).
    PresentCompleted {
        /// The node.
        node: NodeId,
        /// Outcome of the request.
        result: Result<(), ErrorKind>,
    },
    /// A dismiss request started tearing down `node` and its descendants.
    DismissInitiated {
        /// Root of the cascade.
        node: NodeId,
    },
    /// A dismiss request finished.
    DismissCompleted {
        /// Root of the cascade.
        node: NodeId,
        /// Outcome of the request.
        result: Result<(), ErrorKind>,
    },
    /// A single node was dismissed, as part of any cascade.
    Dismissed {
        /// The node.
        node: NodeId,
    },
}
