//! # Looker Reconcile
//!
//! Converges declared Looker access-control objects onto a live instance.
//!
//! ## Overview
//!
//! The looker-reconcile crate provides:
//! - **`IdentityResolver`**: user email to user ID, exactly one match
//! - **`MembershipDiff`**: the add/remove sets between desired and observed
//!   group membership
//! - **`GrantLocator`** and **`GrantReconciler`**: find-then-create-or-update
//!   for folder access grants, since Looker has no upsert
//! - **`OverrideWorkflow`**: converts an inherited grant in place and
//!   detects external reversion
//! - **`Reconciler`** and **`Provider`**: per-kind create/read/update/delete
//!   and one read/plan/apply pass via [`Provider::converge`]
//! - **`Lookup`**: read-only lookups by ID or name
//!
//! ## Architecture
//!
//! ```text
//! Provider
//!   ├─ PermissionSetReconciler / ModelSetReconciler / RoleReconciler
//!   ├─ RoleGroupsReconciler
//!   ├─ GroupReconciler ──── IdentityResolver, MembershipDiff
//!   ├─ FolderReconciler
//!   ├─ FolderAccessReconciler ──── GrantReconciler ── GrantLocator
//!   └─ FolderOverrideReconciler ── OverrideWorkflow ─ GrantLocator
//!                        │
//!                 Arc<dyn LookerApi>
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use looker_client::MemoryLooker;
//! use looker_reconcile::{ConvergeAction, GroupSpec, Provider, ResourceSpec};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let looker = MemoryLooker::new_shared();
//! looker.seed_user("u1", "ana@example.com").await;
//! let provider = Provider::new(looker.clone());
//!
//! let spec = ResourceSpec::Group(GroupSpec {
//!     name: "analysts".to_string(),
//!     user_emails: ["ana@example.com".to_string()].into_iter().collect(),
//!     ..Default::default()
//! });
//! let first = provider.converge(Some(&spec), None).await?;
//! assert_eq!(first.action, ConvergeAction::Created);
//!
//! let again = provider.converge(Some(&spec), first.state.as_ref()).await?;
//! assert_eq!(again.state, first.state);
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod grants;
pub mod identity;
pub mod lookup;
pub mod membership;
pub mod overrides;
pub mod provider;
pub mod resources;

pub use driver::{DriftReason, Observed, Reconciler, Teardown};
pub use error::{ErrorKind, ReconcileError, ReconcileResult};
pub use grants::{GrantAction, GrantLocator, GrantReconciler, ReconciledGrant};
pub use identity::IdentityResolver;
pub use lookup::{FolderQuery, GroupLookup, Lookup, LookupQuery};
pub use membership::{apply_membership, MembershipChange, MembershipDiff};
pub use overrides::{AppliedOverride, OverrideWorkflow};
pub use provider::{ConvergeAction, Convergence, Provider};
pub use resources::{
    FolderAccessSpec, FolderAccessState, FolderSpec, FolderState, GroupSpec, GroupState,
    ModelSetSpec, ModelSetState, OverrideSpec, OverrideState, PermissionSetSpec,
    PermissionSetState, ResourceKind, ResourceSpec, ResourceState, RoleGroupsSpec,
    RoleGroupsState, RoleSpec, RoleState,
};
