// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous views.
//!
//! The view factory hands out futures that complete when the "renderer"
//! delivers a view. The host loop calls `poll_pending` to commit nodes whose
//! views arrived. A dismissal that lands first cancels the present.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example presenter_async_view`

use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use tracing_subscriber::EnvFilter;
use understory_presenter::{
    Args, CallbackError, Controller, ControllerFactory, Created, NodeId, PresentContext,
    PresentFlags, Presenter, UnitKind, ViewFactory, ViewHandle, ViewPlacement, ViewRequest,
    no_args,
};

struct Panel;
impl Controller for Panel {}

struct Panels;
impl ControllerFactory for Panels {
    fn create(
        &mut self,
        _kind: &UnitKind,
        _context: PresentContext,
        _args: Args,
    ) -> Result<Created, CallbackError> {
        Ok(Created::new(Panel))
    }
}

type Queue = Rc<RefCell<Vec<(NodeId, oneshot::Sender<ViewHandle>)>>>;

/// Queues every request until the renderer fulfills it.
struct Renderer {
    queue: Queue,
}

impl ViewFactory for Renderer {
    fn acquire(&mut self, placement: &ViewPlacement, _flags: PresentFlags) -> ViewRequest {
        println!(
            "  view requested for {} ({}) above {:?}",
            placement.node, placement.kind, placement.above
        );
        let (tx, rx) = oneshot::channel();
        self.queue.borrow_mut().push((placement.node, tx));
        async move { rx.await.map_err(|e| Box::new(e) as CallbackError) }.boxed_local()
    }

    fn release(&mut self, view: ViewHandle) {
        if let Ok(name) = view.downcast::<String>() {
            println!("  view released: {name}");
        }
    }
}

fn deliver(queue: &Queue, node: NodeId) {
    let mut queue = queue.borrow_mut();
    if let Some(pos) = queue.iter().position(|(n, _)| *n == node) {
        let (_, tx) = queue.remove(pos);
        let _ = tx.send(Box::new(format!("view of {node}")));
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let queue = Queue::default();
    let presenter = Presenter::with_views(
        Panels,
        Renderer {
            queue: queue.clone(),
        },
    );

    println!("== Request two panels ==");
    let a = presenter
        .present(None, "inbox", no_args(), PresentFlags::empty())
        .unwrap();
    let b = presenter
        .present(None, "compose", no_args(), PresentFlags::POPUP)
        .unwrap();
    println!("  {a}: {:?}, {b}: {:?}", presenter.state(a), presenter.state(b));

    println!("== Dismiss compose before its view arrives ==");
    presenter.dismiss(b).unwrap();

    println!("== Renderer delivers both views ==");
    deliver(&queue, a);
    deliver(&queue, b);
    let committed = presenter.poll_pending().unwrap();
    println!("  committed {committed}");
    println!("  {a}: {:?}, {b}: {:?}", presenter.state(a), presenter.state(b));
    println!("  active: {:?}", presenter.active());

    for event in presenter.take_events() {
        println!("  {event:?}");
    }
}
