//! Dispatch over every managed kind.
//!
//! [`Provider`] owns one reconciler per kind, all sharing the injected
//! [`LookerApi`]. [`Provider::converge`] runs one read/plan/apply pass for a
//! single object.

use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use crate::resources::{
    FolderAccessReconciler, FolderOverrideReconciler, FolderReconciler, GroupReconciler,
    ModelSetReconciler, PermissionSetReconciler, ResourceKind, ResourceSpec, ResourceState,
    RoleGroupsReconciler, RoleReconciler,
};
use looker_client::LookerApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a convergence pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum ConvergeAction {
    /// Nothing was tracked; the object was created.
    Created,
    /// The tracked object had vanished and was created again.
    Recreated(DriftReason),
    /// The tracked object was brought in line with the desired configuration.
    Updated,
    /// The object is no longer desired and was deleted.
    Deleted,
    /// The object is no longer desired; tracking was dropped and Looker left
    /// untouched.
    Released,
    /// The object is no longer desired and had already vanished.
    Forgotten(DriftReason),
    /// Nothing desired and nothing tracked.
    Noop,
}

/// Outcome of one convergence pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    /// What was done.
    pub action: ConvergeAction,
    /// State to track from now on, `None` once the object is gone.
    pub state: Option<ResourceState>,
}

/// The full set of reconcilers.
#[derive(Clone)]
pub struct Provider {
    permission_sets: PermissionSetReconciler,
    model_sets: ModelSetReconciler,
    roles: RoleReconciler,
    role_groups: RoleGroupsReconciler,
    groups: GroupReconciler,
    folders: FolderReconciler,
    folder_access: FolderAccessReconciler,
    folder_overrides: FolderOverrideReconciler,
}

fn mismatch(spec: &ResourceSpec, state: &ResourceState) -> ReconcileError {
    ReconcileError::InvalidSpec(format!(
        "{} spec cannot be applied to tracked {} {}",
        spec.kind(),
        state.kind(),
        state.id()
    ))
}

impl Provider {
    /// Build every reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self {
            permission_sets: PermissionSetReconciler::new(api.clone()),
            model_sets: ModelSetReconciler::new(api.clone()),
            roles: RoleReconciler::new(api.clone()),
            role_groups: RoleGroupsReconciler::new(api.clone()),
            groups: GroupReconciler::new(api.clone()),
            folders: FolderReconciler::new(api.clone()),
            folder_access: FolderAccessReconciler::new(api.clone()),
            folder_overrides: FolderOverrideReconciler::new(api),
        }
    }

    /// Create the object `spec` declares.
    #[instrument(skip(self, spec), fields(kind = %spec.kind()))]
    pub async fn create(&self, spec: &ResourceSpec) -> ReconcileResult<ResourceState> {
        let state = match spec {
            ResourceSpec::PermissionSet(s) => {
                ResourceState::PermissionSet(self.permission_sets.create(s).await?)
            }
            ResourceSpec::ModelSet(s) => ResourceState::ModelSet(self.model_sets.create(s).await?),
            ResourceSpec::Role(s) => ResourceState::Role(self.roles.create(s).await?),
            ResourceSpec::RoleGroups(s) => {
                ResourceState::RoleGroups(self.role_groups.create(s).await?)
            }
            ResourceSpec::Group(s) => ResourceState::Group(self.groups.create(s).await?),
            ResourceSpec::Folder(s) => ResourceState::Folder(self.folders.create(s).await?),
            ResourceSpec::FolderAccess(s) => {
                ResourceState::FolderAccess(self.folder_access.create(s).await?)
            }
            ResourceSpec::FolderPermissionOverride(s) => {
                ResourceState::FolderPermissionOverride(self.folder_overrides.create(s).await?)
            }
        };
        Ok(state)
    }

    /// Observe the object behind `state`.
    #[instrument(skip(self, state), fields(kind = %state.kind(), id = %state.id()))]
    pub async fn read(&self, state: &ResourceState) -> ReconcileResult<Observed<ResourceState>> {
        let observed = match state {
            ResourceState::PermissionSet(s) => self
                .permission_sets
                .read(s)
                .await?
                .map(ResourceState::PermissionSet),
            ResourceState::ModelSet(s) => self.model_sets.read(s).await?.map(ResourceState::ModelSet),
            ResourceState::Role(s) => self.roles.read(s).await?.map(ResourceState::Role),
            ResourceState::RoleGroups(s) => self
                .role_groups
                .read(s)
                .await?
                .map(ResourceState::RoleGroups),
            ResourceState::Group(s) => self.groups.read(s).await?.map(ResourceState::Group),
            ResourceState::Folder(s) => self.folders.read(s).await?.map(ResourceState::Folder),
            ResourceState::FolderAccess(s) => self
                .folder_access
                .read(s)
                .await?
                .map(ResourceState::FolderAccess),
            ResourceState::FolderPermissionOverride(s) => self
                .folder_overrides
                .read(s)
                .await?
                .map(ResourceState::FolderPermissionOverride),
        };
        Ok(observed)
    }

    /// Converge `state` to `spec`. Both must be of the same kind.
    #[instrument(skip(self, spec, state), fields(kind = %state.kind(), id = %state.id()))]
    pub async fn update(
        &self,
        spec: &ResourceSpec,
        state: &ResourceState,
    ) -> ReconcileResult<ResourceState> {
        let next = match (spec, state) {
            (ResourceSpec::PermissionSet(sp), ResourceState::PermissionSet(st)) => {
                ResourceState::PermissionSet(self.permission_sets.update(sp, st).await?)
            }
            (ResourceSpec::ModelSet(sp), ResourceState::ModelSet(st)) => {
                ResourceState::ModelSet(self.model_sets.update(sp, st).await?)
            }
            (ResourceSpec::Role(sp), ResourceState::Role(st)) => {
                ResourceState::Role(self.roles.update(sp, st).await?)
            }
            (ResourceSpec::RoleGroups(sp), ResourceState::RoleGroups(st)) => {
                ResourceState::RoleGroups(self.role_groups.update(sp, st).await?)
            }
            (ResourceSpec::Group(sp), ResourceState::Group(st)) => {
                ResourceState::Group(self.groups.update(sp, st).await?)
            }
            (ResourceSpec::Folder(sp), ResourceState::Folder(st)) => {
                ResourceState::Folder(self.folders.update(sp, st).await?)
            }
            (ResourceSpec::FolderAccess(sp), ResourceState::FolderAccess(st)) => {
                ResourceState::FolderAccess(self.folder_access.update(sp, st).await?)
            }
            (
                ResourceSpec::FolderPermissionOverride(sp),
                ResourceState::FolderPermissionOverride(st),
            ) => ResourceState::FolderPermissionOverride(self.folder_overrides.update(sp, st).await?),
            _ => return Err(mismatch(spec, state)),
        };
        Ok(next)
    }

    /// Tear down the object behind `state`.
    #[instrument(skip(self, state), fields(kind = %state.kind(), id = %state.id()))]
    pub async fn delete(&self, state: &ResourceState) -> ReconcileResult<Teardown> {
        match state {
            ResourceState::PermissionSet(s) => self.permission_sets.delete(s).await,
            ResourceState::ModelSet(s) => self.model_sets.delete(s).await,
            ResourceState::Role(s) => self.roles.delete(s).await,
            ResourceState::RoleGroups(s) => self.role_groups.delete(s).await,
            ResourceState::Group(s) => self.groups.delete(s).await,
            ResourceState::Folder(s) => self.folders.delete(s).await,
            ResourceState::FolderAccess(s) => self.folder_access.delete(s).await,
            ResourceState::FolderPermissionOverride(s) => self.folder_overrides.delete(s).await,
        }
    }

    /// Start tracking an existing object of `kind`.
    #[instrument(skip(self))]
    pub async fn import(&self, kind: ResourceKind, id: &str) -> ReconcileResult<ResourceState> {
        let state = match kind {
            ResourceKind::PermissionSet => {
                ResourceState::PermissionSet(self.permission_sets.import(id).await?)
            }
            ResourceKind::ModelSet => ResourceState::ModelSet(self.model_sets.import(id).await?),
            ResourceKind::Role => ResourceState::Role(self.roles.import(id).await?),
            ResourceKind::RoleGroups => {
                ResourceState::RoleGroups(self.role_groups.import(id).await?)
            }
            ResourceKind::Group => ResourceState::Group(self.groups.import(id).await?),
            ResourceKind::Folder => ResourceState::Folder(self.folders.import(id).await?),
            ResourceKind::FolderAccess => {
                ResourceState::FolderAccess(self.folder_access.import(id).await?)
            }
            ResourceKind::FolderPermissionOverride => {
                ResourceState::FolderPermissionOverride(self.folder_overrides.import(id).await?)
            }
        };
        info!("Imported {} {}", kind, id);
        Ok(state)
    }

    /// Run one read/plan/apply pass for a single object.
    ///
    /// # Arguments
    ///
    /// * `desired` - The declared spec, `None` if the object should not exist
    /// * `tracked` - State from the previous pass, `None` if never applied
    ///
    /// # Returns
    ///
    /// The action taken and the state to track next. On error nothing new
    /// should be recorded, except the state carried by
    /// [`ReconcileError::IncompleteCreate`] (see
    /// [`ReconcileError::created_state`]): that object exists remotely and
    /// must be tracked so the next pass updates it.
    pub async fn converge(
        &self,
        desired: Option<&ResourceSpec>,
        tracked: Option<&ResourceState>,
    ) -> ReconcileResult<Convergence> {
        let Some(tracked) = tracked else {
            return match desired {
                Some(spec) => Ok(Convergence {
                    action: ConvergeAction::Created,
                    state: Some(self.create(spec).await?),
                }),
                None => Ok(Convergence {
                    action: ConvergeAction::Noop,
                    state: None,
                }),
            };
        };

        if let Some(spec) = desired {
            if spec.kind() != tracked.kind() {
                return Err(mismatch(spec, tracked));
            }
        }

        match (self.read(tracked).await?, desired) {
            (Observed::Vanished(reason), Some(spec)) => {
                warn!(kind = %tracked.kind(), id = %tracked.id(), "Tracked object {}, recreating", reason);
                Ok(Convergence {
                    action: ConvergeAction::Recreated(reason),
                    state: Some(self.create(spec).await?),
                })
            }
            (Observed::Vanished(reason), None) => {
                debug!(kind = %tracked.kind(), id = %tracked.id(), "Undesired object already {}", reason);
                Ok(Convergence {
                    action: ConvergeAction::Forgotten(reason),
                    state: None,
                })
            }
            (Observed::Present(current), Some(spec)) => Ok(Convergence {
                action: ConvergeAction::Updated,
                state: Some(self.update(spec, &current).await?),
            }),
            (Observed::Present(current), None) => {
                let action = match self.delete(&current).await? {
                    Teardown::Deleted => ConvergeAction::Deleted,
                    Teardown::Released => ConvergeAction::Released,
                };
                Ok(Convergence {
                    action,
                    state: None,
                })
            }
        }
    }
}
