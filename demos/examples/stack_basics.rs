// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stack basics.
//!
//! Push a few entries with parents, walk the stack both ways, and tear a
//! subtree down deepest first.
//!
//! Run:
//! - `cargo run -p understory_demos --example stack_basics`

use understory_stack::{Stack, StackError};

fn main() {
    let mut stack = Stack::new();
    let main = stack.push(None, "main").unwrap();
    let toolbar = stack.push(None, "toolbar").unwrap();
    let settings = stack.push(Some(main), "settings").unwrap();
    let confirm = stack.push(Some(settings), "confirm").unwrap();
    let tooltip = stack.push(Some(main), "tooltip").unwrap();

    println!("== Bottom → top ==");
    for (key, value) in stack.iter() {
        println!("  {value:<10} depth={} key={key:?}", stack.depth(key));
    }

    println!("== Subtree of settings ==");
    for (_, value) in stack.subtree(settings) {
        println!("  {value}");
    }

    // Removing a node with descendants is refused.
    assert_eq!(stack.remove(main), Err(StackError::HasDescendants(main)));

    println!("== Tear down main, top-down ==");
    let doomed: Vec<_> = stack.subtree(main).rev().map(|(k, _)| k).collect();
    for key in doomed {
        println!("  remove {}", stack.remove(key).unwrap());
    }
    assert!(!stack.contains(confirm) && !stack.contains(tooltip));
    println!("top is now {:?}", stack.peek().map(|k| stack.get(k)));
    assert_eq!(stack.peek(), Ok(toolbar));
}
