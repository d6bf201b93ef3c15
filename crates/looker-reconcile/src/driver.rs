//! The per-kind reconciliation contract.
//!
//! Each managed kind implements [`Reconciler`]: create from a spec, observe
//! the remote object behind tracked state, converge tracked state to a new
//! spec, tear down, and import an existing object. Reading an object that
//! no longer exists is not an error; it yields [`Observed::Vanished`] so the
//! caller can drop its tracking and recreate on the next pass.

use crate::error::ReconcileResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a tracked object is no longer present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftReason {
    /// The remote object was deleted outside this system.
    Deleted,
    /// The remote object was changed back outside this system.
    ExternallyReverted,
}

impl DriftReason {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftReason::Deleted => "deleted",
            DriftReason::ExternallyReverted => "externally_reverted",
        }
    }
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of observing a tracked object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed<S> {
    /// The object exists; carries refreshed state.
    Present(S),
    /// The object is gone or no longer matches what was applied.
    Vanished(DriftReason),
}

impl<S> Observed<S> {
    /// Whether the object is present.
    pub fn is_present(&self) -> bool {
        matches!(self, Observed::Present(_))
    }

    /// The refreshed state, if present.
    pub fn present(self) -> Option<S> {
        match self {
            Observed::Present(state) => Some(state),
            Observed::Vanished(_) => None,
        }
    }

    /// Map the present state.
    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Observed<T> {
        match self {
            Observed::Present(state) => Observed::Present(f(state)),
            Observed::Vanished(reason) => Observed::Vanished(reason),
        }
    }
}

/// What tearing down a tracked object did remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Teardown {
    /// The remote object was deleted.
    Deleted,
    /// Tracking was dropped; the remote object was left untouched.
    Released,
}

/// Reconciliation unit for one managed kind.
///
/// Implementations hold their Looker client, injected at construction.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Desired configuration.
    type Spec: Send + Sync;

    /// Tracked state, including IDs and server-computed fields.
    type State: Send + Sync;

    /// Create the remote object and return its tracked state.
    async fn create(&self, spec: &Self::Spec) -> ReconcileResult<Self::State>;

    /// Observe the remote object behind `state`.
    async fn read(&self, state: &Self::State) -> ReconcileResult<Observed<Self::State>>;

    /// Apply the changes between `state` and `spec`, leaving everything else
    /// alone.
    async fn update(&self, spec: &Self::Spec, state: &Self::State)
        -> ReconcileResult<Self::State>;

    /// Tear down the remote object.
    async fn delete(&self, state: &Self::State) -> ReconcileResult<Teardown>;

    /// Start tracking an existing remote object.
    async fn import(&self, id: &str) -> ReconcileResult<Self::State>;
}
