// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by the presenter.

use std::fmt;

use crate::types::NodeId;

/// Error type returned by controllers, scopes, and factories.
pub type CallbackError = Box<dyn std::error::Error + 'static>;

/// Errors reported by [`Presenter`](crate::Presenter) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The unit kind or parent is not acceptable. Nothing was mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Another stack mutation is in progress. Nothing was mutated.
    #[error("another stack mutation is in progress")]
    Busy,
    /// The controller factory or view factory failed. Nothing was inserted.
    #[error("construction failed: {0}")]
    ConstructionFailed(#[source] CallbackError),
    /// One or more lifecycle callbacks or disposals failed.
    ///
    /// The operation still ran to completion.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleErrors),
    /// The stack holds no nodes.
    #[error("the stack is empty")]
    EmptyCollection,
    /// The presenter was disposed.
    #[error("the presenter has been disposed")]
    Disposed,
}

impl Error {
    /// Copyable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Busy => ErrorKind::Busy,
            Self::ConstructionFailed(_) => ErrorKind::ConstructionFailed,
            Self::Lifecycle(_) => ErrorKind::Lifecycle,
            Self::EmptyCollection => ErrorKind::EmptyCollection,
            Self::Disposed => ErrorKind::Disposed,
        }
    }
}

/// Classification of an [`Error`], carried by [`PresenterEvent`](crate::PresenterEvent)s.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// See [`Error::InvalidArgument`].
    InvalidArgument,
    /// See [`Error::Busy`].
    Busy,
    /// See [`Error::ConstructionFailed`].
    ConstructionFailed,
    /// See [`Error::Lifecycle`].
    Lifecycle,
    /// See [`Error::EmptyCollection`].
    EmptyCollection,
    /// See [`Error::Disposed`].
    Disposed,
    /// A pending present was abandoned before its view arrived.
    Canceled,
}

/// The step of a node's lifecycle that failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Stage {
    /// View acquisition completed with an error after `present` returned.
    AcquireView,
    /// `on_present`.
    Present,
    /// `on_activate`.
    Activate,
    /// `on_deactivate`.
    Deactivate,
    /// `on_dismiss`.
    Dismiss,
    /// Scope release or controller disposal.
    Dispose,
}

/// A single failed callback.
#[derive(Debug, thiserror::Error)]
#[error("{stage:?} failed for node {node}: {source}")]
pub struct LifecycleFailure {
    /// Node whose callback failed.
    pub node: NodeId,
    /// Failing step.
    pub stage: Stage,
    /// Error returned by the callback.
    #[source]
    pub source: CallbackError,
}

/// All callback failures collected during one operation, in the order they happened.
#[derive(Debug, Default)]
pub struct LifecycleErrors {
    /// Collected failures; never empty when returned inside [`Error::Lifecycle`].
    pub failures: Vec<LifecycleFailure>,
}

impl LifecycleErrors {
    /// Iterate failures for a given node.
    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &LifecycleFailure> + '_ {
        self.failures.iter().filter(move |f| f.node == node)
    }

    /// Whether any failure happened at `stage`.
    pub fn has_stage(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }
}

impl fmt::Display for LifecycleErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lifecycle callback(s) failed", self.failures.len())?;
        if let Some(first) = self.failures.first() {
            write!(f, "; first: {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LifecycleErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}

/// Turn collected failures into an operation result.
pub(crate) fn collect(failures: Vec<LifecycleFailure>) -> Result<(), Error> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Lifecycle(LifecycleErrors { failures }))
    }
}

/// Classify an operation result for event reporting.
pub(crate) fn outcome<T>(result: &Result<T, Error>) -> Result<(), ErrorKind> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(e.kind()),
    }
}
