// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presenter basics.
//!
//! Present a main screen, open a modal dialog over it, route commands, and
//! let the dialog close itself from a command handler.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example presenter_basics`

use std::any::Any;

use tracing_subscriber::EnvFilter;
use understory_presenter::{
    Args, CallbackError, Controller, ControllerFactory, Created, PresentContext, PresentFlags,
    Presenter, UnitKind, no_args,
};

struct Screen {
    name: String,
    context: PresentContext,
}

impl Controller for Screen {
    fn on_present(&mut self) -> Result<(), CallbackError> {
        println!("  {} presented", self.name);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<(), CallbackError> {
        println!("  {} active", self.name);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), CallbackError> {
        println!("  {} inactive", self.name);
        Ok(())
    }

    fn on_dismiss(&mut self) -> Result<(), CallbackError> {
        println!("  {} dismissed", self.name);
        Ok(())
    }

    fn on_command(&mut self, name: &str, _args: &dyn Any) -> bool {
        match (self.name.as_str(), name) {
            ("confirm", "cancel") => {
                println!("  confirm closes itself");
                self.context.dismiss().is_ok()
            }
            ("main", "open-settings") => {
                println!("  main handles {name}");
                true
            }
            _ => false,
        }
    }
}

struct Screens;

impl ControllerFactory for Screens {
    fn supports(&self, kind: &UnitKind) -> bool {
        matches!(kind.as_str(), "main" | "confirm")
    }

    fn create(
        &mut self,
        kind: &UnitKind,
        context: PresentContext,
        _args: Args,
    ) -> Result<Created, CallbackError> {
        Ok(Created::new(Screen {
            name: kind.to_string(),
            context,
        }))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let presenter = Presenter::new(Screens);

    println!("== Present main ==");
    let main = presenter
        .present(None, "main", no_args(), PresentFlags::empty())
        .unwrap();

    println!("== Present confirm (modal) ==");
    let confirm = presenter
        .present(Some(main), "confirm", no_args(), PresentFlags::MODAL)
        .unwrap();

    println!("== Commands ==");
    // The modal dialog is a floor: main never sees this.
    let handled = presenter.invoke_command("open-settings", &());
    println!("  open-settings handled: {handled}");
    let handled = presenter.invoke_command("cancel", &());
    println!("  cancel handled: {handled}");
    println!("  confirm state: {:?}", presenter.state(confirm));

    let handled = presenter.invoke_command("open-settings", &());
    println!("  open-settings handled: {handled}");

    println!("== Unknown kinds are rejected ==");
    if let Err(e) = presenter.present(None, "about", no_args(), PresentFlags::empty()) {
        println!("  {e}");
    }

    println!("== Events ==");
    for event in presenter.take_events() {
        println!("  {event:?}");
    }
}
