//! Permission set reconciler.

use super::present;
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use async_trait::async_trait;
use looker_client::{LookerApi, WritePermissionSet};
use looker_model::PermissionSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Desired permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSetSpec {
    /// Name.
    pub name: String,
    /// Permission names.
    pub permissions: BTreeSet<String>,
}

/// Tracked permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSetState {
    /// Looker ID.
    pub id: String,
    /// Name.
    pub name: String,
    /// Permission names.
    pub permissions: BTreeSet<String>,
    /// Whether Looker ships this set.
    pub built_in: bool,
    /// Whether the set grants every permission.
    pub all_access: bool,
    /// API URL of the set.
    pub url: Option<String>,
}

impl From<PermissionSet> for PermissionSetState {
    fn from(set: PermissionSet) -> Self {
        Self {
            id: set.id,
            name: set.name,
            permissions: set.permissions,
            built_in: set.built_in,
            all_access: set.all_access,
            url: set.url,
        }
    }
}

/// Reconciles permission sets.
#[derive(Clone)]
pub struct PermissionSetReconciler {
    api: Arc<dyn LookerApi>,
}

impl PermissionSetReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Reconciler for PermissionSetReconciler {
    type Spec = PermissionSetSpec;
    type State = PermissionSetState;

    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn create(&self, spec: &PermissionSetSpec) -> ReconcileResult<PermissionSetState> {
        let body = WritePermissionSet {
            name: Some(spec.name.clone()),
            permissions: Some(spec.permissions.clone()),
        };
        let set = self.api.create_permission_set(&body).await?;
        info!(id = %set.id, "Created permission set");
        Ok(set.into())
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &PermissionSetState) -> ReconcileResult<Observed<PermissionSetState>> {
        match present(self.api.get_permission_set(&state.id).await)? {
            Some(set) => Ok(Observed::Present(set.into())),
            None => {
                warn!("Permission set {} not found, dropping it from tracking", state.id);
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(id = %state.id))]
    async fn update(
        &self,
        spec: &PermissionSetSpec,
        state: &PermissionSetState,
    ) -> ReconcileResult<PermissionSetState> {
        let body = WritePermissionSet {
            name: (spec.name != state.name).then(|| spec.name.clone()),
            permissions: (spec.permissions != state.permissions).then(|| spec.permissions.clone()),
        };
        if body.name.is_none() && body.permissions.is_none() {
            debug!("Permission set unchanged");
            return Ok(state.clone());
        }

        let set = self.api.update_permission_set(&state.id, &body).await?;
        info!("Updated permission set");
        Ok(set.into())
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &PermissionSetState) -> ReconcileResult<Teardown> {
        self.api.delete_permission_set(&state.id).await?;
        info!("Deleted permission set");
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<PermissionSetState> {
        present(self.api.get_permission_set(id).await)?
            .map(PermissionSetState::from)
            .ok_or_else(|| ReconcileError::not_found("permission set", id))
    }
}
