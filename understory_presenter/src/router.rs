// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command routing.
//!
//! Commands travel from the top of the stack down. The first presented
//! controller that returns `true` from [`Controller::on_command`] consumes the
//! command. A [`PresentFlags::MODAL`](crate::PresentFlags::MODAL) node is a floor:
//! nothing below it is consulted, whether or not it handled the command.
//!
//! The stack is snapshotted before routing starts. Each controller is checked
//! out while it runs, so a handler may dismiss its own node (or present new
//! ones). Nodes removed in the meantime are skipped and stop acting as a modal
//! floor. Lifecycle callbacks that fall due for a controller while its handler
//! runs are delivered, in order, once it returns; a controller whose node
//! disappeared meanwhile is then disposed.
//!
//! [`Controller::on_command`]: crate::Controller::on_command

use std::any::Any;

use tracing::{trace, trace_span};

use crate::presenter::Shared;

pub(crate) fn route(shared: &Shared, name: &str, args: &dyn Any) -> bool {
    let _span = trace_span!("command", name).entered();
    for target in shared.command_targets() {
        let state = shared.state_of(target.node);
        let presented = state.is_some_and(|s| s.is_presented());
        if presented {
            if let Some(mut controller) = shared.check_out(target.node) {
                let handled = controller.on_command(name, args);
                shared.check_in(target.node, controller);
                if handled {
                    trace!(node = %target.node, "handled");
                    return true;
                }
            } else {
                // Already running further up the call stack.
                trace!(node = %target.node, "skipped");
            }
        }
        // A modal node torn down earlier in this pass no longer blocks.
        if target.modal && state.is_some_and(|s| !s.is_dismissed()) {
            trace!(node = %target.node, "stopped at modal node");
            return false;
        }
    }
    false
}
