//! Role group assignment reconciler.
//!
//! Looker replaces a role's group list wholesale, so every write sends the
//! full desired set.

use super::present;
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use async_trait::async_trait;
use looker_client::LookerApi;
use looker_model::Group;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Desired groups holding a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGroupsSpec {
    /// Role ID.
    pub role_id: String,
    /// Group IDs that should hold the role.
    pub group_ids: BTreeSet<String>,
}

/// Tracked role group assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGroupsState {
    /// Role ID.
    pub role_id: String,
    /// Group IDs holding the role.
    pub group_ids: BTreeSet<String>,
}

impl RoleGroupsState {
    fn from_groups(role_id: &str, groups: Vec<Group>) -> Self {
        Self {
            role_id: role_id.to_string(),
            group_ids: groups.into_iter().map(|g| g.id.into_inner()).collect(),
        }
    }
}

/// Reconciles the groups assigned to a role.
#[derive(Clone)]
pub struct RoleGroupsReconciler {
    api: Arc<dyn LookerApi>,
}

impl RoleGroupsReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }

    async fn assign(&self, role_id: &str, group_ids: &BTreeSet<String>) -> ReconcileResult<RoleGroupsState> {
        let ids: Vec<String> = group_ids.iter().cloned().collect();
        let groups = self.api.set_role_groups(role_id, &ids).await?;
        info!("Assigned role {} to {} groups", role_id, groups.len());
        Ok(RoleGroupsState::from_groups(role_id, groups))
    }
}

#[async_trait]
impl Reconciler for RoleGroupsReconciler {
    type Spec = RoleGroupsSpec;
    type State = RoleGroupsState;

    #[instrument(skip(self, spec), fields(role_id = %spec.role_id))]
    async fn create(&self, spec: &RoleGroupsSpec) -> ReconcileResult<RoleGroupsState> {
        self.assign(&spec.role_id, &spec.group_ids).await
    }

    #[instrument(skip(self, state), fields(role_id = %state.role_id))]
    async fn read(&self, state: &RoleGroupsState) -> ReconcileResult<Observed<RoleGroupsState>> {
        match present(self.api.role_groups(&state.role_id).await)? {
            Some(groups) => Ok(Observed::Present(RoleGroupsState::from_groups(
                &state.role_id,
                groups,
            ))),
            None => {
                warn!("Role {} not found, dropping its group assignment", state.role_id);
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(role_id = %state.role_id))]
    async fn update(
        &self,
        spec: &RoleGroupsSpec,
        state: &RoleGroupsState,
    ) -> ReconcileResult<RoleGroupsState> {
        if spec.role_id != state.role_id {
            self.assign(&state.role_id, &BTreeSet::new()).await?;
            return self.assign(&spec.role_id, &spec.group_ids).await;
        }
        if spec.group_ids == state.group_ids {
            debug!("Role groups unchanged");
            return Ok(state.clone());
        }
        self.assign(&spec.role_id, &spec.group_ids).await
    }

    #[instrument(skip(self, state), fields(role_id = %state.role_id))]
    async fn delete(&self, state: &RoleGroupsState) -> ReconcileResult<Teardown> {
        self.assign(&state.role_id, &BTreeSet::new()).await?;
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, role_id: &str) -> ReconcileResult<RoleGroupsState> {
        present(self.api.role_groups(role_id).await)?
            .map(|groups| RoleGroupsState::from_groups(role_id, groups))
            .ok_or_else(|| ReconcileError::not_found("role", role_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looker_client::{MemoryLooker, WriteModelSet, WritePermissionSet, WriteRole};

    async fn role(looker: &MemoryLooker, name: &str) -> String {
        let set = looker
            .create_permission_set(&WritePermissionSet {
                name: Some(format!("{}-perms", name)),
                permissions: None,
            })
            .await
            .unwrap();
        let models = looker
            .create_model_set(&WriteModelSet {
                name: Some(format!("{}-models", name)),
                models: None,
            })
            .await
            .unwrap();
        looker
            .create_role(&WriteRole {
                name: Some(name.to_string()),
                permission_set_id: Some(set.id),
                model_set_id: Some(models.id),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_role_change_clears_old_role() {
        let looker = MemoryLooker::new_shared();
        let viewer = role(&looker, "viewer").await;
        let editor = role(&looker, "editor").await;
        let group = looker.seed_group("finance", &[]).await.id.into_inner();
        let reconciler = RoleGroupsReconciler::new(looker.clone());

        let groups: BTreeSet<String> = [group.clone()].into_iter().collect();
        let state = reconciler
            .create(&RoleGroupsSpec {
                role_id: viewer.clone(),
                group_ids: groups.clone(),
            })
            .await
            .unwrap();
        assert_eq!(state.group_ids, groups);

        let moved = reconciler
            .update(
                &RoleGroupsSpec {
                    role_id: editor.clone(),
                    group_ids: groups.clone(),
                },
                &state,
            )
            .await
            .unwrap();
        assert_eq!(moved.role_id, editor);
        assert!(looker.role_groups(&viewer).await.unwrap().is_empty());
        assert_eq!(looker.role_groups(&editor).await.unwrap().len(), 1);

        assert_eq!(reconciler.delete(&moved).await.unwrap(), Teardown::Deleted);
        assert!(looker.role_groups(&editor).await.unwrap().is_empty());
    }
}
