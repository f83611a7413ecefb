// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presenter implementation.
//!
//! ## Overview
//!
//! The presenter is the only component that mutates the stack. It sequences
//! present and dismiss requests, keeps exactly one node active, and collects
//! lifecycle errors.
//!
//! ## Mutations
//!
//! `present`, `dismiss`, `poll_pending`, and `dispose` hold a mutation guard
//! while they run. A second mutation started before the guard is released
//! (for example from a lifecycle callback or a controller constructor) fails
//! with [`Error::Busy`] and changes nothing.
//!
//! ## Two-phase present
//!
//! 1. Allocate an id, construct the controller, and request a view.
//! 2. Once the view is ready, link the node into the stack, present it, and
//!    re-apply the activation rule.
//!
//! Nothing is linked before phase 2, so a failed construction leaves the stack
//! exactly as it was. If the view is not ready immediately, the node waits in
//! the pending list until [`Presenter::poll_pending`] sees it complete. A
//! pending node that was dismissed in the meantime (directly, through its
//! parent, or by disposing the presenter) releases its view on completion and
//! never presents.
//!
//! ## Activation rule
//!
//! After every mutation the active node is the topmost node that is presented,
//! lacks [`PresentFlags::DO_NOT_ACTIVATE`], and whose ancestors are all presented.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tracing::{debug, debug_span, warn};
use understory_stack::{Key, Stack};

use crate::config::PresenterConfig;
use crate::context::PresentContext;
use crate::error::{self, CallbackError, Error, ErrorKind, LifecycleFailure, Stage};
use crate::event::PresenterEvent;
use crate::factory::{Controller, ControllerFactory, NoViews, ViewFactory, ViewHandle, ViewRequest};
use crate::node::{Node, NodeState};
use crate::router;
use crate::types::{Args, NodeId, PresentFlags, UnitKind, ViewPlacement};

/// Presentation stack orchestrator.
///
/// ## Usage
///
/// - Construct with a [`ControllerFactory`] and optionally a [`ViewFactory`]
///   and [`PresenterConfig`].
/// - Call [`Presenter::present`] to push a unit, [`Presenter::dismiss`] to tear
///   one down together with its descendants.
/// - Call [`Presenter::poll_pending`] from the host loop when views are acquired
///   asynchronously.
/// - Route input with [`Presenter::invoke_command`] and drain notifications
///   with [`Presenter::take_events`].
///
/// The presenter is single-threaded and cheap to move; controllers hold weak
/// handles to it through their [`PresentContext`].
///
/// Dropping the presenter tears the stack down as [`Presenter::dispose`] does
/// and also disposes presents still waiting for their views.
pub struct Presenter {
    shared: Rc<Shared>,
}

impl fmt::Debug for Presenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.state.borrow();
        f.debug_struct("Presenter")
            .field("nodes", &st.stack.len())
            .field("pending", &st.pending.len())
            .field("active", &st.active)
            .field("busy", &self.shared.mutating.get())
            .field("disposed", &st.disposed)
            .finish_non_exhaustive()
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        if self.shared.mutating.get() {
            warn!("presenter dropped during a mutation; skipping teardown");
            return;
        }
        let _span = debug_span!("drop").entered();
        if let Err(e) = self.shared.dispose() {
            warn!(error = %e, "teardown on drop failed");
        }
        let mut failures = Vec::new();
        self.shared.abandon_pending(&mut failures);
        for failure in &failures {
            warn!(error = %failure, "teardown of pending present failed");
        }
    }
}

impl Presenter {
    /// Create a presenter whose views are always ready immediately.
    pub fn new(controllers: impl ControllerFactory + 'static) -> Self {
        Self::with_views(controllers, NoViews)
    }

    /// Create a presenter with an explicit view factory.
    pub fn with_views(
        controllers: impl ControllerFactory + 'static,
        views: impl ViewFactory + 'static,
    ) -> Self {
        Self::with_config(controllers, views, PresenterConfig::default())
    }

    /// Create a presenter with an explicit view factory and configuration.
    pub fn with_config(
        controllers: impl ControllerFactory + 'static,
        views: impl ViewFactory + 'static,
        config: PresenterConfig,
    ) -> Self {
        let state = State {
            next_id: 1,
            stack: Stack::with_capacity(config.initial_capacity),
            keys: HashMap::with_capacity(config.initial_capacity),
            pending: Vec::new(),
            active: None,
            events: Vec::new(),
            orphans: HashMap::new(),
            disposed: false,
        };
        Self {
            shared: Rc::new(Shared {
                config,
                mutating: Cell::new(false),
                state: RefCell::new(state),
                controllers: RefCell::new(Box::new(controllers)),
                views: RefCell::new(Box::new(views)),
            }),
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &PresenterConfig {
        &self.shared.config
    }

    /// Present a unit of `kind`, optionally as a child of `parent`.
    ///
    /// Returns the new node's id. If the view is ready immediately, the node
    /// is presented (and activated, if it is the new effective top) before this
    /// returns; otherwise it stays [`NodeState::Initialized`] until
    /// [`poll_pending`](Self::poll_pending) commits it.
    ///
    /// Fails with [`Error::InvalidArgument`], [`Error::Busy`],
    /// [`Error::ConstructionFailed`], or [`Error::Disposed`] without changing the
    /// stack. [`Error::Lifecycle`] means the node was presented but callbacks
    /// failed along the way.
    ///
    /// When the view request fails immediately, the controller and its scope
    /// are disposed before returning [`Error::ConstructionFailed`]; failures
    /// during that rollback are logged rather than returned.
    pub fn present(
        &self,
        parent: Option<NodeId>,
        kind: impl Into<UnitKind>,
        args: Args,
        flags: PresentFlags,
    ) -> Result<NodeId, Error> {
        self.shared.present(parent, kind.into(), args, flags)
    }

    /// Dismiss `node` and all of its descendants.
    ///
    /// Dismissing a node that is already dismissed or disposed does nothing.
    /// Dismissing a node whose view is still pending cancels it.
    pub fn dismiss(&self, node: NodeId) -> Result<(), Error> {
        self.shared.dismiss(node)
    }

    /// Drive outstanding view acquisitions, committing the ones that completed.
    ///
    /// Returns how many nodes were presented.
    pub fn poll_pending(&self) -> Result<usize, Error> {
        self.shared.poll_pending()
    }

    /// Dismiss every node, cancel pending presents, and reject further presents.
    pub fn dispose(&self) -> Result<(), Error> {
        self.shared.dispose()
    }

    /// Route a command from the top of the stack down.
    ///
    /// Returns whether some controller handled it. Propagation never passes
    /// below a [`PresentFlags::MODAL`] node.
    pub fn invoke_command(&self, name: &str, args: &dyn Any) -> bool {
        router::route(&self.shared, name, args)
    }

    /// Current state of `node`.
    ///
    /// Ids that were issued but whose nodes are gone report
    /// [`NodeState::Disposed`]; ids never issued by this presenter report `None`.
    pub fn state(&self, node: NodeId) -> Option<NodeState> {
        self.shared.state.borrow().state_of(node)
    }

    /// Flags `node` was presented with.
    pub fn flags(&self, node: NodeId) -> Option<PresentFlags> {
        let st = self.shared.state.borrow();
        st.node(node)
            .or_else(|| st.pending(node).map(|p| &p.node))
            .map(|n| n.flags)
    }

    /// Parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let st = self.shared.state.borrow();
        st.node(node)
            .or_else(|| st.pending(node).map(|p| &p.node))
            .and_then(|n| n.parent)
    }

    /// Unit kind of `node`.
    pub fn kind(&self, node: NodeId) -> Option<UnitKind> {
        let st = self.shared.state.borrow();
        st.node(node)
            .or_else(|| st.pending(node).map(|p| &p.node))
            .map(|n| n.kind.clone())
    }

    /// The active node, if any.
    pub fn active(&self) -> Option<NodeId> {
        self.shared.state.borrow().active
    }

    /// Top node of the stack.
    ///
    /// Fails with [`Error::EmptyCollection`] when the stack is empty.
    pub fn top(&self) -> Result<NodeId, Error> {
        self.try_top().ok_or(Error::EmptyCollection)
    }

    /// Top node of the stack, or `None` if it is empty.
    pub fn try_top(&self) -> Option<NodeId> {
        let st = self.shared.state.borrow();
        st.stack.try_peek().and_then(|k| st.node_id(k))
    }

    /// All linked nodes, bottom to top.
    pub fn nodes(&self) -> Vec<NodeId> {
        let st = self.shared.state.borrow();
        st.stack.iter().map(|(_, n)| n.id).collect()
    }

    /// Number of linked nodes.
    pub fn len(&self) -> usize {
        self.shared.state.borrow().stack.len()
    }

    /// Whether no nodes are linked.
    pub fn is_empty(&self) -> bool {
        self.shared.state.borrow().stack.is_empty()
    }

    /// Whether `node` is waiting for its view.
    pub fn is_pending(&self, node: NodeId) -> bool {
        self.shared.state.borrow().pending(node).is_some()
    }

    /// Whether any node is waiting for its view.
    pub fn has_pending(&self) -> bool {
        !self.shared.state.borrow().pending.is_empty()
    }

    /// Presented nodes that are not obscured, bottom to top.
    ///
    /// Everything below the topmost [`PresentFlags::EXCLUSIVE`] node is obscured.
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let st = self.shared.state.borrow();
        let mut out = Vec::new();
        for (_, n) in st.stack.iter().rev() {
            if !n.state().is_presented() {
                continue;
            }
            out.push(n.id);
            if n.flags.contains(PresentFlags::EXCLUSIVE) {
                break;
            }
        }
        out.reverse();
        out
    }

    /// Whether a mutation is in progress.
    pub fn is_busy(&self) -> bool {
        self.shared.mutating.get()
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.shared.state.borrow().disposed
    }

    /// Drain queued events, oldest first.
    pub fn take_events(&self) -> Vec<PresenterEvent> {
        std::mem::take(&mut self.shared.state.borrow_mut().events)
    }
}

/// State shared between the presenter and the contexts handed to controllers.
pub(crate) struct Shared {
    config: PresenterConfig,
    mutating: Cell<bool>,
    state: RefCell<State>,
    controllers: RefCell<Box<dyn ControllerFactory>>,
    views: RefCell<Box<dyn ViewFactory>>,
}

struct State {
    next_id: u64,
    stack: Stack<Node>,
    keys: HashMap<NodeId, Key>,
    /// Nodes waiting for their views, in request order.
    pending: Vec<Pending>,
    active: Option<NodeId>,
    events: Vec<PresenterEvent>,
    /// Callbacks owed to controllers whose nodes were torn down while checked out.
    orphans: HashMap<NodeId, Vec<Stage>>,
    disposed: bool,
}

struct Pending {
    node: Node,
    request: ViewRequest,
    invalidated: bool,
}

/// A node visited by the command router, top-down.
#[derive(Copy, Clone, Debug)]
pub(crate) struct CommandTarget {
    pub(crate) node: NodeId,
    pub(crate) modal: bool,
}

struct MutationGuard<'a>(&'a Cell<bool>);

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl State {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.stack.get(*self.keys.get(&id)?)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let key = *self.keys.get(&id)?;
        self.stack.get_mut(key)
    }

    fn node_id(&self, key: Key) -> Option<NodeId> {
        self.stack.get(key).map(|n| n.id)
    }

    fn pending(&self, id: NodeId) -> Option<&Pending> {
        self.pending.iter().find(|p| p.node.id == id)
    }

    fn state_of(&self, id: NodeId) -> Option<NodeState> {
        if let Some(node) = self.node(id) {
            return Some(node.state());
        }
        if self.pending(id).is_some() {
            return Some(NodeState::Initialized);
        }
        (id.0 > 0 && id.0 < self.next_id).then_some(NodeState::Disposed)
    }

    fn is_presented(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.state().is_presented())
    }

    fn depth(&self, id: NodeId) -> usize {
        self.keys.get(&id).map_or(0, |&k| self.stack.depth(k))
    }

    fn effective_top(&self, candidate: Option<NodeId>) -> Option<NodeId> {
        self.stack
            .iter()
            .rev()
            .find(|&(key, n)| {
                (n.state().is_presented() || Some(n.id) == candidate)
                    && n.activatable()
                    && self
                        .stack
                        .ancestors(key)
                        .all(|a| self.stack.get(a).is_some_and(|p| p.state().is_presented()))
            })
            .map(|(_, n)| n.id)
    }

    fn subtree_top_down(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&key) = self.keys.get(&id) else {
            return Vec::new();
        };
        self.stack.subtree(key).rev().map(|(_, n)| n.id).collect()
    }

    fn roots_top_down(&self) -> Vec<NodeId> {
        self.stack
            .iter()
            .rev()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(_, n)| n.id)
            .collect()
    }
}

fn run_stage(controller: &mut dyn Controller, stage: Stage) -> Result<(), CallbackError> {
    match stage {
        Stage::Present => controller.on_present(),
        Stage::Activate => controller.on_activate(),
        Stage::Deactivate => controller.on_deactivate(),
        Stage::Dismiss => controller.on_dismiss(),
        Stage::AcquireView | Stage::Dispose => Ok(()),
    }
}

fn poll_view(request: &mut ViewRequest) -> Poll<Result<ViewHandle, CallbackError>> {
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    request.poll_unpin(&mut cx)
}

impl Shared {
    fn begin_mutation(&self) -> Result<MutationGuard<'_>, Error> {
        if self.mutating.replace(true) {
            debug!("mutation rejected: another one is in progress");
            return Err(Error::Busy);
        }
        Ok(MutationGuard(&self.mutating))
    }

    fn emit(&self, event: PresenterEvent) {
        self.state.borrow_mut().events.push(event);
    }

    pub(crate) fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.state.borrow().state_of(id)
    }

    /// Whether `id` is dismissed, disposed, or a canceled pending present.
    pub(crate) fn is_dismissed(&self, id: NodeId) -> bool {
        let st = self.state.borrow();
        if let Some(p) = st.pending(id) {
            return p.invalidated;
        }
        st.state_of(id).is_some_and(NodeState::is_dismissed)
    }

    pub(crate) fn command_targets(&self) -> Vec<CommandTarget> {
        let st = self.state.borrow();
        st.stack
            .iter()
            .rev()
            .map(|(_, n)| CommandTarget {
                node: n.id,
                modal: n.flags.contains(PresentFlags::MODAL),
            })
            .collect()
    }

    pub(crate) fn present(
        self: &Rc<Self>,
        parent: Option<NodeId>,
        kind: UnitKind,
        args: Args,
        flags: PresentFlags,
    ) -> Result<NodeId, Error> {
        if kind.is_empty() {
            return Err(Error::InvalidArgument("unit kind is empty".into()));
        }
        let _guard = self.begin_mutation()?;
        let _span = debug_span!("present", kind = %kind, parent = ?parent, flags = ?flags).entered();

        if !self.controllers.borrow().supports(&kind) {
            return Err(Error::InvalidArgument(format!(
                "unit kind `{kind}` is not constructible"
            )));
        }

        let (id, placement, replaces) = {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return Err(Error::Disposed);
            }
            if let Some(p) = parent
                && !st.is_presented(p)
            {
                return Err(Error::InvalidArgument(format!("parent {p} is not presented")));
            }
            let (node_parent, replaces) = if flags.contains(PresentFlags::RESET) {
                (None, None)
            } else if flags.contains(PresentFlags::SET) {
                match parent {
                    Some(p) => (st.node(p).and_then(|n| n.parent), Some(p)),
                    None => (None, None),
                }
            } else {
                (parent, None)
            };
            let depth = node_parent.map_or(0, |p| st.depth(p) + 1);
            if let Some(max) = self.config.max_depth
                && depth > max
            {
                return Err(Error::InvalidArgument(format!(
                    "depth {depth} exceeds the maximum of {max}"
                )));
            }
            let parent_key = node_parent.and_then(|p| st.keys.get(&p).copied());
            let above = st
                .stack
                .insertion_point(parent_key)
                .and_then(|k| st.node_id(k));

            let id = NodeId(st.next_id);
            st.next_id += 1;
            st.events.push(PresenterEvent::PresentInitiated {
                node: id,
                kind: kind.clone(),
            });
            let placement = ViewPlacement {
                node: id,
                kind: kind.clone(),
                parent: node_parent,
                above,
                depth,
            };
            (id, placement, replaces)
        };

        let context = PresentContext::new(Rc::downgrade(self), id);
        let created = self.controllers.borrow_mut().create(&kind, context, args);
        let created = match created {
            Ok(created) => created,
            Err(source) => {
                debug!(node = %id, error = %source, "controller construction failed");
                let err = Error::ConstructionFailed(source);
                self.emit(PresenterEvent::PresentCompleted {
                    node: id,
                    result: Err(err.kind()),
                });
                return Err(err);
            }
        };
        let mut node = Node::new(
            id,
            placement.parent,
            kind,
            flags,
            created.controller,
            created.scope,
        );
        node.replaces = replaces;

        let mut request = self.views.borrow_mut().acquire(&placement, flags);
        if self.config.poll_on_present {
            match poll_view(&mut request) {
                Poll::Ready(Ok(view)) => {
                    let mut failures = Vec::new();
                    self.commit(node, view, &mut failures);
                    return error::collect(failures).map(|()| id);
                }
                Poll::Ready(Err(source)) => {
                    debug!(node = %id, error = %source, "view acquisition failed");
                    let mut failures = Vec::new();
                    self.finalize(node, &mut failures);
                    // The caller sees `ConstructionFailed`; rollback failures are only logged.
                    for failure in &failures {
                        warn!(node = %id, error = %failure, "cleanup after failed present");
                    }
                    let err = Error::ConstructionFailed(source);
                    self.emit(PresenterEvent::PresentCompleted {
                        node: id,
                        result: Err(err.kind()),
                    });
                    return Err(err);
                }
                Poll::Pending => {}
            }
        }

        debug!(node = %id, "view pending");
        self.state.borrow_mut().pending.push(Pending {
            node,
            request,
            invalidated: false,
        });
        Ok(id)
    }

    /// Link a constructed node whose view is ready, then present it.
    ///
    /// Returns `false` if the node could not be linked because its parent is
    /// gone; the node is disposed in that case.
    fn commit(&self, mut node: Node, view: ViewHandle, failures: &mut Vec<LifecycleFailure>) -> bool {
        let id = node.id;
        let before = failures.len();
        node.view = Some(view);

        if node.flags.contains(PresentFlags::RESET) {
            let roots = self.state.borrow().roots_top_down();
            for root in roots {
                self.cascade(root, failures);
            }
        } else if let Some(replaced) = node.replaces {
            self.cascade(replaced, failures);
        }

        let rejected = {
            let mut st = self.state.borrow_mut();
            let parent_key = match node.parent {
                None => Some(None),
                Some(p) if st.is_presented(p) => st.keys.get(&p).copied().map(Some),
                Some(_) => None,
            };
            match parent_key {
                Some(parent_key) if !st.disposed => match st.stack.push(parent_key, node) {
                    Ok(key) => {
                        st.keys.insert(id, key);
                        None
                    }
                    Err(e) => {
                        warn!(node = %id, error = %e, "failed to link node");
                        return false;
                    }
                },
                _ => Some(node),
            }
        };
        if let Some(node) = rejected {
            debug!(node = %id, "parent gone before commit; discarding");
            self.finalize(node, failures);
            self.emit(PresenterEvent::PresentCompleted {
                node: id,
                result: Err(ErrorKind::Canceled),
            });
            return false;
        }

        // The node above which the new one lands stops being active first.
        let superseded = {
            let st = self.state.borrow();
            let target = st.effective_top(Some(id));
            st.active.filter(|&a| Some(a) != target)
        };
        if let Some(prev) = superseded {
            self.advance(prev, NodeState::Presented, failures);
        }
        self.advance(id, NodeState::Presented, failures);
        self.reconcile_activation(failures);

        let result = if failures.len() > before {
            Err(ErrorKind::Lifecycle)
        } else {
            Ok(())
        };
        self.emit(PresenterEvent::PresentCompleted { node: id, result });
        true
    }

    pub(crate) fn dismiss(&self, id: NodeId) -> Result<(), Error> {
        {
            let st = self.state.borrow();
            match st.pending(id) {
                Some(p) if p.invalidated => return Ok(()),
                Some(_) => {}
                None if !st.is_presented(id) => return Ok(()),
                None => {}
            }
        }
        let _guard = self.begin_mutation()?;
        let _span = debug_span!("dismiss", node = %id).entered();
        self.emit(PresenterEvent::DismissInitiated { node: id });

        {
            let mut st = self.state.borrow_mut();
            if let Some(p) = st.pending.iter_mut().find(|p| p.node.id == id) {
                debug!("canceling present while its view is pending");
                p.invalidated = true;
                st.events.push(PresenterEvent::DismissCompleted {
                    node: id,
                    result: Ok(()),
                });
                return Ok(());
            }
        }

        let mut failures = Vec::new();
        self.cascade(id, &mut failures);
        self.reconcile_activation(&mut failures);
        let result = error::collect(failures);
        self.emit(PresenterEvent::DismissCompleted {
            node: id,
            result: error::outcome(&result),
        });
        result
    }

    pub(crate) fn poll_pending(&self) -> Result<usize, Error> {
        if self.state.borrow().pending.is_empty() {
            return Ok(0);
        }
        let _guard = self.begin_mutation()?;
        let _span = debug_span!("poll_pending").entered();

        let ids: Vec<NodeId> = self
            .state
            .borrow()
            .pending
            .iter()
            .map(|p| p.node.id)
            .collect();
        let mut failures = Vec::new();
        let mut committed = 0;
        for id in ids {
            // Poll with the state released so the view future may query the presenter.
            let Some(mut request) = self.take_request(id) else {
                continue;
            };
            let polled = poll_view(&mut request);
            let entry = {
                let mut st = self.state.borrow_mut();
                let Some(pos) = st.pending.iter().position(|p| p.node.id == id) else {
                    continue;
                };
                if polled.is_pending() {
                    st.pending[pos].request = request;
                    continue;
                }
                st.pending.remove(pos)
            };
            let Poll::Ready(result) = polled else {
                continue;
            };
            if self.complete(entry, result, &mut failures) {
                committed += 1;
            }
        }
        error::collect(failures).map(|()| committed)
    }

    fn take_request(&self, id: NodeId) -> Option<ViewRequest> {
        let mut st = self.state.borrow_mut();
        let p = st.pending.iter_mut().find(|p| p.node.id == id)?;
        Some(std::mem::replace(
            &mut p.request,
            futures::future::pending().boxed_local(),
        ))
    }

    /// Resolve a pending node whose view request finished.
    fn complete(
        &self,
        entry: Pending,
        result: Result<ViewHandle, CallbackError>,
        failures: &mut Vec<LifecycleFailure>,
    ) -> bool {
        let Pending {
            mut node,
            invalidated,
            ..
        } = entry;
        let id = node.id;
        let canceled = invalidated || self.state.borrow().disposed;
        match result {
            Ok(view) if !canceled => self.commit(node, view, failures),
            Ok(view) => {
                debug!(node = %id, "releasing view of canceled present");
                node.view = Some(view);
                self.finalize(node, failures);
                self.emit(PresenterEvent::PresentCompleted {
                    node: id,
                    result: Err(ErrorKind::Canceled),
                });
                false
            }
            Err(source) => {
                debug!(node = %id, error = %source, "view acquisition failed");
                self.finalize(node, failures);
                let result = if canceled {
                    Err(ErrorKind::Canceled)
                } else {
                    failures.push(LifecycleFailure {
                        node: id,
                        stage: Stage::AcquireView,
                        source,
                    });
                    Err(ErrorKind::ConstructionFailed)
                };
                self.emit(PresenterEvent::PresentCompleted { node: id, result });
                false
            }
        }
    }

    pub(crate) fn dispose(&self) -> Result<(), Error> {
        let _guard = self.begin_mutation()?;
        let _span = debug_span!("dispose").entered();
        let roots = {
            let mut st = self.state.borrow_mut();
            if st.disposed {
                return Ok(());
            }
            st.disposed = true;
            for p in &mut st.pending {
                p.invalidated = true;
            }
            st.roots_top_down()
        };
        let mut failures = Vec::new();
        for root in roots {
            self.cascade(root, &mut failures);
        }
        self.state.borrow_mut().active = None;
        error::collect(failures)
    }

    /// Tear down `root` and its descendants in two top-down passes.
    fn cascade(&self, root: NodeId, failures: &mut Vec<LifecycleFailure>) {
        let doomed = {
            let mut st = self.state.borrow_mut();
            let doomed = st.subtree_top_down(root);
            for p in &mut st.pending {
                if p.node.parent.is_some_and(|parent| doomed.contains(&parent)) {
                    debug!(node = %p.node.id, "canceling pending child of dismissed node");
                    p.invalidated = true;
                }
            }
            doomed
        };
        debug!(root = %root, count = doomed.len(), "cascade");

        for &id in &doomed {
            if self.state_of(id) == Some(NodeState::Active) {
                self.advance(id, NodeState::Presented, failures);
            }
            if self.state_of(id) == Some(NodeState::Presented) {
                self.advance(id, NodeState::Dismissed, failures);
                self.emit(PresenterEvent::Dismissed { node: id });
            }
        }

        for &id in &doomed {
            let node = {
                let mut st = self.state.borrow_mut();
                let Some(&key) = st.keys.get(&id) else {
                    continue;
                };
                match st.stack.remove(key) {
                    Ok(node) => {
                        st.keys.remove(&id);
                        node
                    }
                    Err(e) => {
                        warn!(node = %id, error = %e, "failed to unlink node");
                        continue;
                    }
                }
            };
            self.finalize(node, failures);
        }
    }

    fn reconcile_activation(&self, failures: &mut Vec<LifecycleFailure>) {
        let (current, target) = {
            let st = self.state.borrow();
            (st.active, st.effective_top(None))
        };
        if current == target {
            return;
        }
        if let Some(current) = current {
            if self.state_of(current) == Some(NodeState::Active) {
                self.advance(current, NodeState::Presented, failures);
            } else {
                self.state.borrow_mut().active = None;
            }
        }
        if let Some(target) = target {
            self.advance(target, NodeState::Active, failures);
        }
    }

    /// Move a linked node to `next` and fire the matching callback.
    fn advance(&self, id: NodeId, next: NodeState, failures: &mut Vec<LifecycleFailure>) {
        let stage = {
            let mut st = self.state.borrow_mut();
            let Some(node) = st.node_mut(id) else {
                return;
            };
            let stage = match (node.state(), next) {
                (NodeState::Initialized, NodeState::Presented) => Stage::Present,
                (NodeState::Presented, NodeState::Active) => Stage::Activate,
                (NodeState::Active, NodeState::Presented) => Stage::Deactivate,
                (NodeState::Presented, NodeState::Dismissed) => Stage::Dismiss,
                (from, to) => {
                    debug!(node = %id, ?from, ?to, "ignoring transition");
                    return;
                }
            };
            node.set_state(next);
            match stage {
                Stage::Activate => st.active = Some(id),
                Stage::Deactivate if st.active == Some(id) => st.active = None,
                _ => {}
            }
            stage
        };
        self.invoke(id, stage, failures);
    }

    fn invoke(&self, id: NodeId, stage: Stage, failures: &mut Vec<LifecycleFailure>) {
        let Some(mut controller) = self.check_out(id) else {
            // The controller is running a command handler; it gets the callback on check-in.
            if let Some(node) = self.state.borrow_mut().node_mut(id) {
                node.missed.push(stage);
            }
            debug!(node = %id, ?stage, "controller busy; callback deferred");
            return;
        };
        let result = run_stage(controller.as_mut(), stage);
        self.check_in(id, controller);
        if let Err(source) = result {
            debug!(node = %id, ?stage, error = %source, "callback failed");
            failures.push(LifecycleFailure {
                node: id,
                stage,
                source,
            });
        }
    }

    /// Take a node's controller out so it can run without the state borrowed.
    pub(crate) fn check_out(&self, id: NodeId) -> Option<Box<dyn Controller>> {
        self.state.borrow_mut().node_mut(id)?.controller.take()
    }

    /// Return a controller taken with [`check_out`](Self::check_out).
    ///
    /// Callbacks that fell due while it was out are delivered first, in order.
    /// If the node was torn down meanwhile, the controller is disposed here.
    pub(crate) fn check_in(&self, id: NodeId, mut controller: Box<dyn Controller>) {
        loop {
            let missed = {
                let mut st = self.state.borrow_mut();
                match st.node_mut(id) {
                    Some(node) if node.missed.is_empty() => {
                        node.controller = Some(controller);
                        return;
                    }
                    Some(node) => std::mem::take(&mut node.missed),
                    None => break,
                }
            };
            // Replayed callbacks may queue more; loop until none are left.
            self.replay(id, controller.as_mut(), missed);
        }

        let missed = self
            .state
            .borrow_mut()
            .orphans
            .remove(&id)
            .unwrap_or_else(|| vec![Stage::Dismiss]);
        debug!(node = %id, "disposing controller of node torn down while it was running");
        self.replay(id, controller.as_mut(), missed);
        if let Err(e) = self.dispose_controller(controller) {
            warn!(node = %id, error = %e, "disposal failed for orphaned controller");
        }
    }

    /// Deliver deferred callbacks. No operation is left to report to, so
    /// failures are logged.
    fn replay(&self, id: NodeId, controller: &mut dyn Controller, stages: Vec<Stage>) {
        for stage in stages {
            debug!(node = %id, ?stage, "delivering deferred callback");
            if let Err(e) = run_stage(controller, stage) {
                warn!(node = %id, ?stage, error = %e, "deferred callback failed");
            }
        }
    }

    /// Dispose a node's resources; the node must already be unlinked.
    fn finalize(&self, mut node: Node, failures: &mut Vec<LifecycleFailure>) {
        let id = node.id;
        node.set_state(NodeState::Disposed);
        if node.controller.is_none() && !node.missed.is_empty() {
            let missed = std::mem::take(&mut node.missed);
            self.state.borrow_mut().orphans.insert(id, missed);
        }
        if let Some(scope) = node.scope.take()
            && let Err(source) = scope.release()
        {
            failures.push(LifecycleFailure {
                node: id,
                stage: Stage::Dispose,
                source,
            });
        }
        if let Some(controller) = node.controller.take()
            && let Err(source) = self.dispose_controller(controller)
        {
            failures.push(LifecycleFailure {
                node: id,
                stage: Stage::Dispose,
                source,
            });
        }
        if let Some(view) = node.view.take() {
            match self.views.try_borrow_mut() {
                Ok(mut views) => views.release(view),
                Err(_) => warn!(node = %id, "view factory busy; dropping view"),
            }
        }
    }

    /// Drop every pending present, releasing whatever is already acquired.
    fn abandon_pending(&self, failures: &mut Vec<LifecycleFailure>) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending);
        for Pending {
            mut node,
            mut request,
            ..
        } in pending
        {
            if let Poll::Ready(Ok(view)) = poll_view(&mut request) {
                node.view = Some(view);
            }
            drop(request);
            self.finalize(node, failures);
        }
    }

    fn dispose_controller(&self, controller: Box<dyn Controller>) -> Result<(), CallbackError> {
        match self.controllers.try_borrow_mut() {
            Ok(mut factory) => factory.dispose(controller),
            Err(_) => {
                warn!("controller factory busy; dropping controller");
                drop(controller);
                Ok(())
            }
        }
    }
}
