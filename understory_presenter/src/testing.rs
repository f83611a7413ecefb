// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording controllers and factories shared by the unit tests.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;

use crate::{
    CallbackError, Controller, ControllerFactory, Created, Error, NodeId, NodeState,
    PresentContext, PresentFlags, Presenter, PresenterConfig, PresenterEvent, Scope, Stage,
    UnitKind, ViewFactory, ViewHandle, ViewPlacement, ViewRequest, no_args,
};

pub(crate) type Log = Rc<RefCell<Vec<String>>>;

/// Per-kind behavior of the recording controller.
#[derive(Clone, Debug, Default)]
pub(crate) struct Script {
    /// Callbacks that return an error. `Stage::Dispose` fails the scope release.
    pub(crate) fail: Vec<Stage>,
    /// Commands the controller consumes.
    pub(crate) handles: Vec<&'static str>,
    /// Kind to present from `on_activate`.
    pub(crate) present_on_activate: Option<&'static str>,
    /// Command on which the controller dismisses its own node.
    pub(crate) dismiss_on_command: Option<&'static str>,
    /// Command on which the controller presents `(kind, flags)` from its context.
    pub(crate) present_on_command: Option<(&'static str, &'static str, PresentFlags)>,
    /// Command on which the controller dismisses the latest node of another kind.
    /// The command is then handled according to `handles`.
    pub(crate) dismiss_other: Option<(&'static str, &'static str)>,
    pub(crate) fail_create: bool,
    pub(crate) fail_view: bool,
}

type Scripts = Rc<RefCell<HashMap<String, Script>>>;
type Contexts = Rc<RefCell<HashMap<String, PresentContext>>>;
type Senders = Rc<RefCell<Vec<(NodeId, String, oneshot::Sender<ViewHandle>)>>>;

fn record(log: &Log, label: &str, what: &str) {
    log.borrow_mut().push(format!("{label}:{what}"));
}

struct Recorder {
    label: String,
    context: PresentContext,
    contexts: Contexts,
    script: Script,
    log: Log,
    /// Callback ordering mistakes seen by this controller.
    violations: Log,
    active: bool,
    dismissed: bool,
}

impl Recorder {
    fn violation(&self, what: &str) {
        record(&self.violations, &self.label, what);
    }

    fn step(&self, stage: Stage, what: &str) -> Result<(), CallbackError> {
        record(&self.log, &self.label, what);
        if self.dismissed {
            self.violation(&format!("{what} after dismiss"));
        }
        if self.script.fail.contains(&stage) {
            Err(format!("{} {what} failed", self.label).into())
        } else {
            Ok(())
        }
    }
}

impl Controller for Recorder {
    fn on_present(&mut self) -> Result<(), CallbackError> {
        self.step(Stage::Present, "present")
    }

    fn on_activate(&mut self) -> Result<(), CallbackError> {
        if self.active {
            self.violation("activate while active");
        }
        self.active = true;
        let result = self.step(Stage::Activate, "activate");
        if let Some(kind) = self.script.present_on_activate {
            let outcome = match self.context.present(kind, no_args(), PresentFlags::empty()) {
                Ok(_) => "nested:ok",
                Err(Error::Busy) => "nested:busy",
                Err(_) => "nested:err",
            };
            record(&self.log, &self.label, outcome);
        }
        result
    }

    fn on_deactivate(&mut self) -> Result<(), CallbackError> {
        if !self.active {
            self.violation("deactivate while inactive");
        }
        self.active = false;
        self.step(Stage::Deactivate, "deactivate")
    }

    fn on_dismiss(&mut self) -> Result<(), CallbackError> {
        if self.active {
            self.violation("dismiss while active");
        }
        let result = self.step(Stage::Dismiss, "dismiss");
        self.dismissed = true;
        result
    }

    fn on_command(&mut self, name: &str, _args: &dyn Any) -> bool {
        record(&self.log, &self.label, &format!("cmd:{name}"));
        if self.script.dismiss_on_command == Some(name) {
            return self.context.dismiss().is_ok();
        }
        if let Some((command, kind, flags)) = self.script.present_on_command
            && command == name
        {
            return self.context.present(kind, no_args(), flags).is_ok();
        }
        if let Some((command, other)) = self.script.dismiss_other
            && command == name
        {
            let target = self.contexts.borrow().get(other).cloned();
            if let Some(target) = target
                && target.dismiss().is_err()
            {
                self.violation(&format!("could not dismiss {other}"));
            }
        }
        self.script.handles.iter().any(|&h| h == name)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.active {
            self.violation("dropped while active");
        }
        record(&self.log, &self.label, "drop");
    }
}

struct TestScope {
    label: String,
    fail: bool,
    log: Log,
}

impl Scope for TestScope {
    fn release(self: Box<Self>) -> Result<(), CallbackError> {
        record(&self.log, &self.label, "release");
        if self.fail {
            Err(format!("{} release failed", self.label).into())
        } else {
            Ok(())
        }
    }
}

struct TestControllers {
    log: Log,
    violations: Log,
    scripts: Scripts,
    contexts: Contexts,
}

impl ControllerFactory for TestControllers {
    fn supports(&self, kind: &UnitKind) -> bool {
        kind.as_str() != "abstract"
    }

    fn create(
        &mut self,
        kind: &UnitKind,
        context: PresentContext,
        _args: crate::Args,
    ) -> Result<Created, CallbackError> {
        let label = kind.to_string();
        let script = self.scripts.borrow().get(&label).cloned().unwrap_or_default();
        if script.fail_create {
            return Err(format!("cannot build {label}").into());
        }
        record(&self.log, &label, "create");
        self.contexts
            .borrow_mut()
            .insert(label.clone(), context.clone());
        let scope = TestScope {
            label: label.clone(),
            fail: script.fail.contains(&Stage::Dispose),
            log: self.log.clone(),
        };
        let recorder = Recorder {
            label,
            context,
            contexts: self.contexts.clone(),
            script,
            log: self.log.clone(),
            violations: self.violations.clone(),
            active: false,
            dismissed: false,
        };
        Ok(Created::new(recorder).with_scope(scope))
    }
}

struct TestViews {
    log: Log,
    scripts: Scripts,
    deferred: Rc<Cell<bool>>,
    senders: Senders,
}

impl ViewFactory for TestViews {
    fn acquire(&mut self, placement: &ViewPlacement, _flags: PresentFlags) -> ViewRequest {
        let label = placement.kind.to_string();
        record(&self.log, &label, "acquire");
        let fail = self
            .scripts
            .borrow()
            .get(&label)
            .is_some_and(|s| s.fail_view);
        if fail {
            let err: CallbackError = format!("no view for {label}").into();
            return futures::future::ready(Err(err)).boxed_local();
        }
        if self.deferred.get() {
            let (tx, rx) = oneshot::channel();
            self.senders.borrow_mut().push((placement.node, label, tx));
            return async move { rx.await.map_err(|e| Box::new(e) as CallbackError) }
                .boxed_local();
        }
        futures::future::ready(Ok(Box::new(label) as ViewHandle)).boxed_local()
    }

    fn release(&mut self, view: ViewHandle) {
        if let Ok(label) = view.downcast::<String>() {
            record(&self.log, &label, "view-release");
        }
    }
}

/// A presenter wired to recording factories.
pub(crate) struct Harness {
    pub(crate) presenter: Presenter,
    log: Log,
    violations: Log,
    scripts: Scripts,
    contexts: Contexts,
    deferred: Rc<Cell<bool>>,
    senders: Senders,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(PresenterConfig::default())
    }

    pub(crate) fn with_config(config: PresenterConfig) -> Self {
        let log = Log::default();
        let violations = Log::default();
        let scripts = Scripts::default();
        let contexts = Contexts::default();
        let deferred = Rc::new(Cell::new(false));
        let senders = Senders::default();
        let controllers = TestControllers {
            log: log.clone(),
            violations: violations.clone(),
            scripts: scripts.clone(),
            contexts: contexts.clone(),
        };
        let views = TestViews {
            log: log.clone(),
            scripts: scripts.clone(),
            deferred: deferred.clone(),
            senders: senders.clone(),
        };
        Self {
            presenter: Presenter::with_config(controllers, views, config),
            log,
            violations,
            scripts,
            contexts,
            deferred,
            senders,
        }
    }

    pub(crate) fn script(&self, kind: &str, script: Script) {
        self.scripts.borrow_mut().insert(kind.to_string(), script);
    }

    /// Make subsequent view requests wait for [`Self::resolve_view`].
    pub(crate) fn defer_views(&self, deferred: bool) {
        self.deferred.set(deferred);
    }

    /// Complete the deferred view request of `node`.
    pub(crate) fn resolve_view(&self, node: NodeId) -> bool {
        let mut senders = self.senders.borrow_mut();
        let Some(pos) = senders.iter().position(|(n, _, _)| *n == node) else {
            return false;
        };
        let (_, label, tx) = senders.remove(pos);
        tx.send(Box::new(label)).is_ok()
    }

    /// Drop the deferred view request of `node`, failing it.
    pub(crate) fn abandon_view(&self, node: NodeId) {
        self.senders.borrow_mut().retain(|(n, _, _)| *n != node);
    }

    pub(crate) fn present(&self, parent: Option<NodeId>, kind: &'static str) -> NodeId {
        self.present_with(parent, kind, PresentFlags::empty())
            .unwrap()
    }

    pub(crate) fn present_with(
        &self,
        parent: Option<NodeId>,
        kind: &'static str,
        flags: PresentFlags,
    ) -> Result<NodeId, Error> {
        self.presenter.present(parent, kind, no_args(), flags)
    }

    /// Context handed to the most recent controller of `kind`.
    pub(crate) fn context(&self, kind: &str) -> PresentContext {
        self.contexts.borrow()[kind].clone()
    }

    pub(crate) fn state(&self, node: NodeId) -> NodeState {
        self.presenter.state(node).unwrap()
    }

    pub(crate) fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub(crate) fn take_events(&self) -> Vec<PresenterEvent> {
        self.presenter.take_events()
    }

    /// Drop the presenter and return what its teardown logged.
    pub(crate) fn finish(self) -> Vec<String> {
        let log = self.log.clone();
        let violations = self.violations.clone();
        drop(self);
        assert_eq!(*violations.borrow(), Vec::<String>::new());
        std::mem::take(&mut *log.borrow_mut())
    }

    /// Check contiguity, the activation rule, and that every controller saw
    /// its callbacks in lifecycle order.
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(
            *self.violations.borrow(),
            Vec::<String>::new(),
            "callbacks out of order"
        );
        let p = &self.presenter;
        let nodes = p.nodes();
        let is_descendant = |node: NodeId, ancestor: NodeId| {
            let mut cur = p.parent(node);
            while let Some(c) = cur {
                if c == ancestor {
                    return true;
                }
                cur = p.parent(c);
            }
            false
        };

        for (i, &n) in nodes.iter().enumerate() {
            let run = nodes[i + 1..]
                .iter()
                .take_while(|&&m| is_descendant(m, n))
                .count();
            let total = nodes.iter().filter(|&&m| is_descendant(m, n)).count();
            assert_eq!(run, total, "descendants of {n} are not contiguous in {nodes:?}");
            assert!(p.state(n).is_some_and(NodeState::is_presented));
        }

        let active: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|&n| p.state(n) == Some(NodeState::Active))
            .collect();
        assert!(active.len() <= 1, "more than one active node: {active:?}");
        let expected = nodes.iter().rev().copied().find(|&n| {
            !p.flags(n)
                .is_some_and(|f| f.contains(PresentFlags::DO_NOT_ACTIVATE))
        });
        assert_eq!(p.active(), expected);
        assert_eq!(active.first().copied(), expected);
    }
}
