// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_stack --heading-base-level=0

//! Understory Stack: an ordered, tree-aware stack of entries.
//!
//! ## Overview
//!
//! [`Stack`] keeps a single bottom → top sequence of entries, where each entry may name a parent.
//! Pushing a child links it immediately after the parent's existing descendant run, so every
//! entry's descendants always form one contiguous run right after it.
//! This gives presentation stacks (screens, dialogs, popups) a global z-order that also respects
//! their ownership tree, without re-sorting.
//!
//! - Entries are addressed by a generational [`Key`]; stale keys never alias a later entry.
//! - Removal is O(1) and refuses to unlink an entry whose descendants are still present.
//! - Iteration is double-ended: forward is bottom → top, `.rev()` is top → bottom.
//!
//! ## Example
//!
//! ```rust
//! use understory_stack::{Stack, StackError};
//!
//! let mut stack = Stack::new();
//! let main = stack.push(None, "main").unwrap();
//! let hud = stack.push(None, "hud").unwrap();
//!
//! // A child of `main` lands after `main`'s run, below `hud`.
//! let menu = stack.push(Some(main), "menu").unwrap();
//! let order: Vec<_> = stack.iter().map(|(_, v)| *v).collect();
//! assert_eq!(order, ["main", "menu", "hud"]);
//!
//! // Top-down walk.
//! let top_down: Vec<_> = stack.iter().rev().map(|(_, v)| *v).collect();
//! assert_eq!(top_down, ["hud", "menu", "main"]);
//!
//! // Descendants go first.
//! assert_eq!(stack.remove(main), Err(StackError::HasDescendants(main)));
//! stack.remove(menu).unwrap();
//! stack.remove(main).unwrap();
//! assert_eq!(stack.peek(), Ok(hud));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod stack;
mod types;

pub use stack::{Ancestors, Iter, Stack};
pub use types::{Key, StackError};
