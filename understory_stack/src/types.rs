// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the stack: keys and errors.

/// Identifier for an entry in a [`Stack`](crate::Stack).
///
/// This is a small, copyable handle consisting of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On push, a fresh slot is allocated with generation `1`.
/// - On remove, the slot is freed; any existing `Key` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `Key`.
///
/// Stale keys never alias a different live entry because the generation must match.
/// Use [`Stack::contains`](crate::Stack::contains) to check liveness.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Key(pub(crate) u32, pub(crate) u32);

impl Key {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Slot index of this key.
    pub const fn slot(self) -> u32 {
        self.0
    }

    /// Generation of this key.
    pub const fn generation(self) -> u32 {
        self.1
    }
}

/// Errors reported by [`Stack`](crate::Stack) operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum StackError {
    /// The stack holds no entries.
    #[error("stack is empty")]
    Empty,
    /// The key does not refer to a live entry.
    #[error("key {0:?} does not refer to a live entry")]
    StaleKey(Key),
    /// The entry still has descendants linked after it.
    #[error("entry {0:?} still has live descendants")]
    HasDescendants(Key),
}
