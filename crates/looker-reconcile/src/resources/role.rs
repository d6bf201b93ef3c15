//! Role reconciler.

use super::present;
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use async_trait::async_trait;
use looker_client::{LookerApi, WriteRole};
use looker_model::Role;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Desired role: a permission set applied to a model set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Role name.
    pub name: String,
    /// Permission set granted by the role.
    pub permission_set_id: String,
    /// Model set the permissions apply to.
    pub model_set_id: String,
}

/// Tracked role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleState {
    /// Looker ID.
    pub id: String,
    /// Role name.
    pub name: String,
    /// Permission set granted by the role.
    pub permission_set_id: Option<String>,
    /// Model set the permissions apply to.
    pub model_set_id: Option<String>,
    /// API URL of the role.
    pub url: Option<String>,
}

impl From<Role> for RoleState {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            permission_set_id: role.permission_set_id,
            model_set_id: role.model_set_id,
            url: role.url,
        }
    }
}

/// Reconciles roles.
#[derive(Clone)]
pub struct RoleReconciler {
    api: Arc<dyn LookerApi>,
}

impl RoleReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }
}

fn changed(desired: &str, current: &Option<String>) -> Option<String> {
    (current.as_deref() != Some(desired)).then(|| desired.to_string())
}

#[async_trait]
impl Reconciler for RoleReconciler {
    type Spec = RoleSpec;
    type State = RoleState;

    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn create(&self, spec: &RoleSpec) -> ReconcileResult<RoleState> {
        let body = WriteRole {
            name: Some(spec.name.clone()),
            permission_set_id: Some(spec.permission_set_id.clone()),
            model_set_id: Some(spec.model_set_id.clone()),
        };
        let role = self.api.create_role(&body).await?;
        info!(id = %role.id, "Created role");
        Ok(role.into())
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &RoleState) -> ReconcileResult<Observed<RoleState>> {
        match present(self.api.get_role(&state.id).await)? {
            Some(role) => Ok(Observed::Present(role.into())),
            None => {
                warn!("Role {} not found, dropping it from tracking", state.id);
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(id = %state.id))]
    async fn update(&self, spec: &RoleSpec, state: &RoleState) -> ReconcileResult<RoleState> {
        let body = WriteRole {
            name: (spec.name != state.name).then(|| spec.name.clone()),
            permission_set_id: changed(&spec.permission_set_id, &state.permission_set_id),
            model_set_id: changed(&spec.model_set_id, &state.model_set_id),
        };
        if body == WriteRole::default() {
            debug!("Role unchanged");
            return Ok(state.clone());
        }

        let role = self.api.update_role(&state.id, &body).await?;
        info!("Updated role");
        Ok(role.into())
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &RoleState) -> ReconcileResult<Teardown> {
        self.api.delete_role(&state.id).await?;
        info!("Deleted role");
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<RoleState> {
        present(self.api.get_role(id).await)?
            .map(RoleState::from)
            .ok_or_else(|| ReconcileError::not_found("role", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looker_client::{MemoryLooker, WriteModelSet, WritePermissionSet};

    #[tokio::test]
    async fn test_update_switches_permission_set_only() {
        let looker = MemoryLooker::new_shared();
        let mut sets = Vec::new();
        for name in ["viewers", "editors"] {
            let set = looker
                .create_permission_set(&WritePermissionSet {
                    name: Some(name.to_string()),
                    permissions: None,
                })
                .await
                .unwrap();
            sets.push(set.id);
        }
        let models = looker
            .create_model_set(&WriteModelSet {
                name: Some("all".to_string()),
                models: None,
            })
            .await
            .unwrap();
        looker.clear_calls().await;

        let reconciler = RoleReconciler::new(looker.clone());
        let spec = RoleSpec {
            name: "Analyst".to_string(),
            permission_set_id: sets[0].clone(),
            model_set_id: models.id.clone(),
        };
        let state = reconciler.create(&spec).await.unwrap();

        let unchanged = reconciler.update(&spec, &state).await.unwrap();
        assert_eq!(unchanged, state);

        let spec = RoleSpec {
            permission_set_id: sets[1].clone(),
            ..spec
        };
        let updated = reconciler.update(&spec, &state).await.unwrap();
        assert_eq!(updated.permission_set_id.as_deref(), Some(sets[1].as_str()));
        assert_eq!(updated.model_set_id.as_deref(), Some(models.id.as_str()));
        assert_eq!(looker.mutation_count().await, 2);
    }
}
