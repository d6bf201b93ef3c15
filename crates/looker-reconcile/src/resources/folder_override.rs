//! Folder permission override reconciler.
//!
//! Backed by [`OverrideWorkflow`]. Deleting a tracked override releases it:
//! the converted grant stays in Looker exactly as last applied.

use super::parse_grant_target;
use crate::driver::{Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use crate::grants::GrantLocator;
use crate::overrides::OverrideWorkflow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use looker_client::LookerApi;
use looker_model::{GrantOrigin, PermissionLevel, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Desired override for one principal on one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSpec {
    /// The folder's content-metadata ID.
    pub content_metadata_id: String,
    /// Principal whose grant is converted.
    pub principal: Principal,
    /// Level to convert the grant to.
    pub level: PermissionLevel,
}

/// Tracked override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideState {
    /// ID of the converted grant.
    pub grant_id: String,
    /// The folder's content-metadata ID.
    pub content_metadata_id: String,
    /// Holder of the grant.
    pub principal: Principal,
    /// Level last applied.
    pub level: PermissionLevel,
    /// Level the grant had before the last conversion.
    pub previous_level: Option<PermissionLevel>,
    /// Always [`GrantOrigin::Adopted`]: overrides never create grants.
    pub origin: GrantOrigin,
    /// When the grant was last converted. `None` for imported overrides.
    pub converted_at: Option<DateTime<Utc>>,
}

/// Reconciles folder permission overrides.
#[derive(Clone)]
pub struct FolderOverrideReconciler {
    workflow: OverrideWorkflow,
    locator: GrantLocator,
}

impl FolderOverrideReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self {
            workflow: OverrideWorkflow::new(api.clone()),
            locator: GrantLocator::new(api),
        }
    }
}

#[async_trait]
impl Reconciler for FolderOverrideReconciler {
    type Spec = OverrideSpec;
    type State = OverrideState;

    #[instrument(skip(self, spec), fields(content_metadata_id = %spec.content_metadata_id, principal = %spec.principal))]
    async fn create(&self, spec: &OverrideSpec) -> ReconcileResult<OverrideState> {
        let applied = self
            .workflow
            .apply(&spec.content_metadata_id, &spec.principal, spec.level)
            .await?;

        Ok(OverrideState {
            grant_id: applied.grant.id,
            content_metadata_id: spec.content_metadata_id.clone(),
            principal: spec.principal.clone(),
            level: applied.grant.level,
            previous_level: Some(applied.previous_level),
            origin: GrantOrigin::Adopted,
            converted_at: Some(applied.converted_at),
        })
    }

    #[instrument(skip(self, state), fields(grant_id = %state.grant_id))]
    async fn read(&self, state: &OverrideState) -> ReconcileResult<Observed<OverrideState>> {
        let observed = self
            .workflow
            .verify(&state.content_metadata_id, &state.principal, state.level)
            .await?;
        Ok(observed.map(|grant| OverrideState {
            grant_id: grant.id,
            ..state.clone()
        }))
    }

    /// Re-runs the whole workflow; a changed target releases the old one.
    #[instrument(skip(self, spec, state), fields(grant_id = %state.grant_id))]
    async fn update(&self, spec: &OverrideSpec, state: &OverrideState) -> ReconcileResult<OverrideState> {
        if state.content_metadata_id != spec.content_metadata_id || state.principal != spec.principal {
            self.delete(state).await?;
        }
        self.create(spec).await
    }

    async fn delete(&self, state: &OverrideState) -> ReconcileResult<Teardown> {
        Ok(self
            .workflow
            .release(&state.content_metadata_id, &state.principal))
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<OverrideState> {
        let (content_metadata_id, principal) = parse_grant_target(id)?;
        let grant = self
            .locator
            .find(&content_metadata_id, &principal)
            .await?
            .ok_or_else(|| ReconcileError::not_found("permission override", id))?;
        info!(grant_id = %grant.id, "Adopted grant as override at {}", grant.level);

        Ok(OverrideState {
            grant_id: grant.id,
            content_metadata_id,
            principal,
            level: grant.level,
            previous_level: None,
            origin: GrantOrigin::Adopted,
            converted_at: None,
        })
    }
}
