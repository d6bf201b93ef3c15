//! Model set reconciler.

use super::present;
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use async_trait::async_trait;
use looker_client::{LookerApi, WriteModelSet};
use looker_model::ModelSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Desired model set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSetSpec {
    /// Name.
    pub name: String,
    /// LookML model names.
    pub models: BTreeSet<String>,
}

/// Tracked model set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSetState {
    /// Looker ID.
    pub id: String,
    /// Name.
    pub name: String,
    /// LookML model names.
    pub models: BTreeSet<String>,
    /// Whether Looker ships this set.
    pub built_in: bool,
    /// Whether the set covers every model.
    pub all_access: bool,
    /// API URL of the set.
    pub url: Option<String>,
}

impl From<ModelSet> for ModelSetState {
    fn from(set: ModelSet) -> Self {
        Self {
            id: set.id,
            name: set.name,
            models: set.models,
            built_in: set.built_in,
            all_access: set.all_access,
            url: set.url,
        }
    }
}

/// Reconciles model sets.
#[derive(Clone)]
pub struct ModelSetReconciler {
    api: Arc<dyn LookerApi>,
}

impl ModelSetReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Reconciler for ModelSetReconciler {
    type Spec = ModelSetSpec;
    type State = ModelSetState;

    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn create(&self, spec: &ModelSetSpec) -> ReconcileResult<ModelSetState> {
        let body = WriteModelSet {
            name: Some(spec.name.clone()),
            models: Some(spec.models.clone()),
        };
        let set = self.api.create_model_set(&body).await?;
        info!(id = %set.id, "Created model set");
        Ok(set.into())
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn read(&self, state: &ModelSetState) -> ReconcileResult<Observed<ModelSetState>> {
        match present(self.api.get_model_set(&state.id).await)? {
            Some(set) => Ok(Observed::Present(set.into())),
            None => {
                warn!("Model set {} not found, dropping it from tracking", state.id);
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(id = %state.id))]
    async fn update(&self, spec: &ModelSetSpec, state: &ModelSetState) -> ReconcileResult<ModelSetState> {
        let body = WriteModelSet {
            name: (spec.name != state.name).then(|| spec.name.clone()),
            models: (spec.models != state.models).then(|| spec.models.clone()),
        };
        if body.name.is_none() && body.models.is_none() {
            debug!("Model set unchanged");
            return Ok(state.clone());
        }

        let set = self.api.update_model_set(&state.id, &body).await?;
        info!("Updated model set");
        Ok(set.into())
    }

    #[instrument(skip(self, state), fields(id = %state.id))]
    async fn delete(&self, state: &ModelSetState) -> ReconcileResult<Teardown> {
        self.api.delete_model_set(&state.id).await?;
        info!("Deleted model set");
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<ModelSetState> {
        present(self.api.get_model_set(id).await)?
            .map(ModelSetState::from)
            .ok_or_else(|| ReconcileError::not_found("model set", id))
    }
}
