// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presenter configuration.

/// Tunables for a [`Presenter`](crate::Presenter).
///
/// ```
/// use understory_presenter::PresenterConfig;
///
/// let config = PresenterConfig::default().with_max_depth(Some(4));
/// assert_eq!(config.max_depth, Some(4));
/// assert!(config.poll_on_present);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenterConfig {
    /// Maximum number of ancestors a node may have. `None` means unlimited.
    pub max_depth: Option<usize>,
    /// Poll the view request once inside `present`, so views that are ready
    /// immediately commit before `present` returns.
    pub poll_on_present: bool,
    /// Number of node slots to reserve up front.
    pub initial_capacity: usize,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            poll_on_present: true,
            initial_capacity: 8,
        }
    }
}

impl PresenterConfig {
    /// Set [`max_depth`](Self::max_depth).
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set [`poll_on_present`](Self::poll_on_present).
    pub fn with_poll_on_present(mut self, poll: bool) -> Self {
        self.poll_on_present = poll;
        self
    }

    /// Set [`initial_capacity`](Self::initial_capacity).
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
