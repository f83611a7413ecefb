// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_presenter --heading-base-level=0

//! Understory Presenter: a presentation stack engine.
//!
//! ## Overview
//!
//! A [`Presenter`] owns a stack of presented units (screens, dialogs, popups).
//! Each unit is a [`Controller`] built by a [`ControllerFactory`] and shown
//! through a view obtained from a [`ViewFactory`]. Units may be presented as
//! children of other units; the stack keeps every unit's descendants directly
//! above it (see [`understory_stack`]), and dismissing a unit tears down its
//! whole subtree, deepest first.
//!
//! Exactly one unit is *active* at a time: the topmost presented unit that did
//! not opt out with [`PresentFlags::DO_NOT_ACTIVATE`]. Commands routed with
//! [`Presenter::invoke_command`] travel top-down and stop at the first
//! controller that handles them, or at a [`PresentFlags::MODAL`] unit.
//!
//! ## Lifecycle
//!
//! Nodes move through [`NodeState`]:
//! `Initialized → Presented ⇄ Active → Dismissed → Disposed`.
//! A node is linked into the stack only once its view is ready, so a failed
//! construction never leaves a partial node behind. Lifecycle callbacks that
//! fail do not abort the operation; their errors are collected into
//! [`Error::Lifecycle`].
//!
//! Stack mutations are serialized. Presenting or dismissing from inside a
//! lifecycle callback fails with [`Error::Busy`]; command handlers may mutate
//! freely.
//!
//! ## Example
//!
//! ```rust
//! use understory_presenter::{
//!     CallbackError, Controller, ControllerFactory, Created, NodeState, PresentContext,
//!     PresentFlags, Presenter, UnitKind, Args, no_args,
//! };
//!
//! struct Screen;
//! impl Controller for Screen {}
//!
//! struct Screens;
//! impl ControllerFactory for Screens {
//!     fn create(
//!         &mut self,
//!         _kind: &UnitKind,
//!         _context: PresentContext,
//!         _args: Args,
//!     ) -> Result<Created, CallbackError> {
//!         Ok(Created::new(Screen))
//!     }
//! }
//!
//! let presenter = Presenter::new(Screens);
//! let main = presenter.present(None, "main", no_args(), PresentFlags::empty()).unwrap();
//! let dialog = presenter
//!     .present(Some(main), "confirm", no_args(), PresentFlags::MODAL)
//!     .unwrap();
//! assert_eq!(presenter.active(), Some(dialog));
//! assert_eq!(presenter.state(main), Some(NodeState::Presented));
//!
//! // Dismissing the parent takes the dialog with it.
//! presenter.dismiss(main).unwrap();
//! assert!(presenter.is_empty());
//! assert_eq!(presenter.state(dialog), Some(NodeState::Disposed));
//! ```

mod config;
mod context;
mod error;
mod event;
mod factory;
mod node;
mod presenter;
mod router;
mod types;

#[cfg(test)]
mod testing;

pub use config::PresenterConfig;
pub use context::PresentContext;
pub use error::{CallbackError, Error, ErrorKind, LifecycleErrors, LifecycleFailure, Stage};
pub use event::PresenterEvent;
pub use factory::{
    Controller, ControllerFactory, Created, NoViews, Scope, ViewFactory, ViewHandle, ViewRequest,
};
pub use node::NodeState;
pub use presenter::Presenter;
pub use types::{Args, NodeId, PresentFlags, UnitKind, ViewPlacement, no_args};
