// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seams to the outside world: controllers, their factory, and the view factory.
//!
//! ## Controllers
//!
//! A [`Controller`] is the presented unit. The presenter calls into it in one
//! direction only: `on_present`, then any number of `on_activate` /
//! `on_deactivate` pairs, then `on_dismiss`, after which the controller is handed
//! back to [`ControllerFactory::dispose`]. Controllers talk back to the presenter
//! through the [`PresentContext`] they receive at construction.
//!
//! ## Views
//!
//! A [`ViewFactory`] supplies the on-screen representation. Acquisition may be
//! asynchronous: [`ViewFactory::acquire`] returns a [`ViewRequest`] future that
//! the presenter polls from [`Presenter::poll_pending`](crate::Presenter::poll_pending).

use std::any::Any;
use std::fmt;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::context::PresentContext;
use crate::error::CallbackError;
use crate::types::{Args, PresentFlags, UnitKind, ViewPlacement};

/// A presented unit.
///
/// All callbacks default to doing nothing. A failing callback does not stop the
/// transition it reports; the error is collected and returned from the
/// operation that triggered it.
pub trait Controller {
    /// The node was linked into the stack and its view is ready. Fires once.
    fn on_present(&mut self) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The node became the active node.
    fn on_activate(&mut self) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The node stopped being the active node.
    fn on_deactivate(&mut self) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The node is being dismissed. Fires at most once.
    fn on_dismiss(&mut self) -> Result<(), CallbackError> {
        Ok(())
    }

    /// Handle a routed command. Return `true` to stop propagation.
    fn on_command(&mut self, _name: &str, _args: &dyn Any) -> bool {
        false
    }
}

/// A disposable resource released together with its node.
pub trait Scope {
    /// Release the resource.
    fn release(self: Box<Self>) -> Result<(), CallbackError>;
}

/// Output of [`ControllerFactory::create`].
pub struct Created {
    pub(crate) controller: Box<dyn Controller>,
    pub(crate) scope: Option<Box<dyn Scope>>,
}

impl Created {
    /// Wrap a controller.
    pub fn new(controller: impl Controller + 'static) -> Self {
        Self {
            controller: Box::new(controller),
            scope: None,
        }
    }

    /// Attach a scope that is released when the node is disposed.
    pub fn with_scope(mut self, scope: impl Scope + 'static) -> Self {
        self.scope = Some(Box::new(scope));
        self
    }
}

impl fmt::Debug for Created {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Created")
            .field("has_scope", &self.scope.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds and disposes controllers.
pub trait ControllerFactory {
    /// Whether `kind` names a constructible unit.
    ///
    /// Unsupported kinds are rejected with
    /// [`Error::InvalidArgument`](crate::Error::InvalidArgument) before any
    /// state changes.
    fn supports(&self, _kind: &UnitKind) -> bool {
        true
    }

    /// Construct a controller for `kind`.
    ///
    /// `context` is bound to the node being created. Presenting or dismissing
    /// through it from inside `create` fails with [`Error::Busy`](crate::Error::Busy).
    fn create(
        &mut self,
        kind: &UnitKind,
        context: PresentContext,
        args: Args,
    ) -> Result<Created, CallbackError>;

    /// Dispose a controller whose node was torn down.
    fn dispose(&mut self, controller: Box<dyn Controller>) -> Result<(), CallbackError> {
        drop(controller);
        Ok(())
    }
}

/// Opaque view handle produced by a [`ViewFactory`].
pub type ViewHandle = Box<dyn Any>;

/// Pending view acquisition.
pub type ViewRequest = LocalBoxFuture<'static, Result<ViewHandle, CallbackError>>;

/// Acquires and releases on-screen representations.
pub trait ViewFactory {
    /// Start acquiring a view for a node about to be presented.
    fn acquire(&mut self, placement: &ViewPlacement, flags: PresentFlags) -> ViewRequest;

    /// Release a view, either from a disposed node or from a canceled present.
    fn release(&mut self, view: ViewHandle);
}

/// View factory for headless use: every request is ready immediately with an
/// empty handle.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoViews;

impl ViewFactory for NoViews {
    fn acquire(&mut self, _placement: &ViewPlacement, _flags: PresentFlags) -> ViewRequest {
        futures::future::ready(Ok(Box::new(()) as ViewHandle)).boxed_local()
    }

    fn release(&mut self, view: ViewHandle) {
        drop(view);
    }
}
