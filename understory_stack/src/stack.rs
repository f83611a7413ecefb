// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core stack implementation: slots, links, iteration.

use alloc::vec::Vec;

use crate::types::{Key, StackError};

/// Ordered, tree-aware stack.
///
/// Entries form a single doubly-linked sequence from bottom (oldest) to top
/// (newest). Each entry may name a parent; the stack keeps every entry's
/// descendants in a contiguous run immediately after it, so a subtree can be
/// walked or torn down without scanning the whole sequence.
pub struct Stack<T> {
    slots: Vec<Option<Slot<T>>>,
    generations: Vec<u32>, // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    head: Option<Key>,
    tail: Option<Key>,
    len: usize,
}

impl<T> core::fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("len", &self.len)
            .field("slots_total", &self.slots.len())
            .field("free_list", &self.free_list.len())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish_non_exhaustive()
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    parent: Option<Key>,
    prev: Option<Key>,
    next: Option<Key>,
    value: T,
}

impl<T> Stack<T> {
    /// Create an empty stack.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Create an empty stack with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stack holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `key` refers to a live entry.
    pub fn contains(&self, key: Key) -> bool {
        self.slot(key).is_some()
    }

    /// Shared access to an entry's value.
    pub fn get(&self, key: Key) -> Option<&T> {
        self.slot(key).map(|s| &s.value)
    }

    /// Mutable access to an entry's value.
    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.slots
            .get_mut(key.idx())?
            .as_mut()
            .filter(|s| s.generation == key.1)
            .map(|s| &mut s.value)
    }

    /// Parent of `key`, or `None` for roots and stale keys.
    pub fn parent(&self, key: Key) -> Option<Key> {
        self.slot(key)?.parent
    }

    /// Entry directly above `key` in stack order.
    pub fn next(&self, key: Key) -> Option<Key> {
        self.slot(key)?.next
    }

    /// Entry directly below `key` in stack order.
    pub fn prev(&self, key: Key) -> Option<Key> {
        self.slot(key)?.prev
    }

    /// Bottom (oldest) entry.
    pub fn first(&self) -> Option<Key> {
        self.head
    }

    /// Top entry, or `None` if the stack is empty.
    pub fn try_peek(&self) -> Option<Key> {
        self.tail
    }

    /// Top entry.
    ///
    /// Fails with [`StackError::Empty`] when no entries are present.
    pub fn peek(&self) -> Result<Key, StackError> {
        self.tail.ok_or(StackError::Empty)
    }

    /// Whether `ancestor` appears on the parent chain of `node`.
    ///
    /// An entry is not its own descendant.
    pub fn is_descendant_of(&self, node: Key, ancestor: Key) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Iterate the parent chain of `key`, nearest parent first.
    pub fn ancestors(&self, key: Key) -> Ancestors<'_, T> {
        Ancestors {
            stack: self,
            cur: self.parent(key),
        }
    }

    /// Number of ancestors of `key`.
    pub fn depth(&self, key: Key) -> usize {
        self.ancestors(key).count()
    }

    /// Whether any live entry has `key` on its parent chain.
    pub fn has_descendants(&self, key: Key) -> bool {
        // Descendants are contiguous, so only the next entry needs checking.
        self.next(key)
            .is_some_and(|next| self.is_descendant_of(next, key))
    }

    /// Last entry of the run formed by `key` and its descendants.
    ///
    /// Returns `key` itself when it has no descendants and `None` for stale keys.
    pub fn last_descendant(&self, key: Key) -> Option<Key> {
        if !self.contains(key) {
            return None;
        }
        let mut last = key;
        while let Some(next) = self.next(last)
            && self.is_descendant_of(next, key)
        {
            last = next;
        }
        Some(last)
    }

    /// Entry that a new entry pushed under `parent` would be linked after.
    ///
    /// Returns `None` when the new entry would become the bottom of the stack,
    /// which only happens for an empty stack.
    pub fn insertion_point(&self, parent: Option<Key>) -> Option<Key> {
        match parent {
            Some(p) => self.last_descendant(p),
            None => self.tail,
        }
    }

    /// Push `value` onto the stack.
    ///
    /// With no parent the entry becomes the new top. With a parent, the entry is
    /// linked right after the parent's current descendant run, making it the
    /// parent's newest child while keeping the run contiguous.
    pub fn push(&mut self, parent: Option<Key>, value: T) -> Result<Key, StackError> {
        let after = match parent {
            Some(p) => Some(self.last_descendant(p).ok_or(StackError::StaleKey(p))?),
            None => self.tail,
        };
        let key = self.alloc(parent, value);
        self.link_after(key, after);
        self.len += 1;
        Ok(key)
    }

    /// Unlink and return the entry for `key`.
    ///
    /// Fails with [`StackError::HasDescendants`] while any descendant is still
    /// linked; descendants must be removed first.
    pub fn remove(&mut self, key: Key) -> Result<T, StackError> {
        let (prev, next) = match self.slot(key) {
            Some(s) => (s.prev, s.next),
            None => return Err(StackError::StaleKey(key)),
        };
        if self.has_descendants(key) {
            return Err(StackError::HasDescendants(key));
        }
        match prev {
            Some(p) => self.link_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.link_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let slot = self.slots[key.idx()].take().expect("dangling Key");
        self.free_list.push(key.idx());
        self.len -= 1;
        Ok(slot.value)
    }

    /// Iterate all entries from bottom to top.
    ///
    /// Use `.rev()` for top-to-bottom order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            stack: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    /// Iterate keys from bottom to top.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = Key> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate `key` followed by its descendants, in stack order.
    ///
    /// Yields nothing for stale keys.
    pub fn subtree(&self, key: Key) -> Iter<'_, T> {
        let Some(last) = self.last_descendant(key) else {
            return Iter {
                stack: self,
                front: None,
                back: None,
                remaining: 0,
            };
        };
        let mut remaining = 1;
        let mut cur = key;
        while cur != last {
            cur = self.link(cur).next.expect("descendant run is linked");
            remaining += 1;
        }
        Iter {
            stack: self,
            front: Some(key),
            back: Some(last),
            remaining,
        }
    }

    fn slot(&self, key: Key) -> Option<&Slot<T>> {
        self.slots
            .get(key.idx())?
            .as_ref()
            .filter(|s| s.generation == key.1)
    }

    /// Access a linked slot; panics if `key` is stale.
    fn link(&self, key: Key) -> &Slot<T> {
        self.slot(key).expect("dangling Key")
    }

    /// Access a linked slot mutably; panics if `key` is stale.
    fn link_mut(&mut self, key: Key) -> &mut Slot<T> {
        self.slots[key.idx()].as_mut().expect("dangling Key")
    }

    fn alloc(&mut self, parent: Option<Key>, value: T) -> Key {
        let slot = |generation| Slot {
            generation,
            parent,
            prev: None,
            next: None,
            value,
        };
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(slot(generation));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Key uses 32-bit indices by design."
            )]
            Key::new(idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.slots.push(Some(slot(generation)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Key uses 32-bit indices by design."
            )]
            Key::new((self.slots.len() - 1) as u32, generation)
        }
    }

    fn link_after(&mut self, key: Key, after: Option<Key>) {
        let next = match after {
            Some(a) => self.link(a).next,
            None => self.head,
        };
        {
            let s = self.link_mut(key);
            s.prev = after;
            s.next = next;
        }
        match after {
            Some(a) => self.link_mut(a).next = Some(key),
            None => self.head = Some(key),
        }
        match next {
            Some(n) => self.link_mut(n).prev = Some(key),
            None => self.tail = Some(key),
        }
    }
}

/// Double-ended iterator over `(Key, &T)` pairs in stack order.
///
/// Returned by [`Stack::iter`] and [`Stack::subtree`].
#[derive(Clone)]
pub struct Iter<'a, T> {
    stack: &'a Stack<T>,
    front: Option<Key>,
    back: Option<Key>,
    remaining: usize,
}

impl<T> core::fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Iter")
            .field("front", &self.front)
            .field("back", &self.back)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Key, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.front?;
        let slot = self.stack.link(key);
        self.front = slot.next;
        self.remaining -= 1;
        Some((key, &slot.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.back?;
        let slot = self.stack.link(key);
        self.back = slot.prev;
        self.remaining -= 1;
        Some((key, &slot.value))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Iterator over the parent chain of an entry, nearest first.
///
/// Returned by [`Stack::ancestors`].
pub struct Ancestors<'a, T> {
    stack: &'a Stack<T>,
    cur: Option<Key>,
}

impl<T> core::fmt::Debug for Ancestors<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ancestors")
            .field("cur", &self.cur)
            .finish_non_exhaustive()
    }
}

impl<T> Iterator for Ancestors<'_, T> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        let cur = self.cur?;
        self.cur = self.stack.parent(cur);
        Some(cur)
    }
}
