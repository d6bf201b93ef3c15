//! Folder access grant reconciler.

use super::parse_grant_target;
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use crate::grants::{GrantAction, GrantReconciler};
use async_trait::async_trait;
use looker_client::LookerApi;
use looker_model::{GrantOrigin, PermissionLevel, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Desired access for one principal on one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderAccessSpec {
    /// The folder's content-metadata ID.
    pub content_metadata_id: String,
    /// Group or user receiving access.
    pub principal: Principal,
    /// Access level.
    pub level: PermissionLevel,
}

/// Tracked folder access grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderAccessState {
    /// Grant ID.
    pub grant_id: String,
    /// The folder's content-metadata ID.
    pub content_metadata_id: String,
    /// Holder of the grant.
    pub principal: Principal,
    /// Observed access level.
    pub level: PermissionLevel,
    /// Whether the grant was created here or found in place.
    pub origin: GrantOrigin,
}

impl FolderAccessState {
    fn targets(&self, spec: &FolderAccessSpec) -> bool {
        self.content_metadata_id == spec.content_metadata_id && self.principal == spec.principal
    }
}

/// Reconciles folder access grants.
#[derive(Clone)]
pub struct FolderAccessReconciler {
    api: Arc<dyn LookerApi>,
    grants: GrantReconciler,
}

impl FolderAccessReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self {
            grants: GrantReconciler::new(api.clone()),
            api,
        }
    }
}

#[async_trait]
impl Reconciler for FolderAccessReconciler {
    type Spec = FolderAccessSpec;
    type State = FolderAccessState;

    #[instrument(skip(self, spec), fields(content_metadata_id = %spec.content_metadata_id, principal = %spec.principal))]
    async fn create(&self, spec: &FolderAccessSpec) -> ReconcileResult<FolderAccessState> {
        let reconciled = self
            .grants
            .reconcile(&spec.content_metadata_id, &spec.principal, spec.level)
            .await?;
        if reconciled.origin == GrantOrigin::Adopted {
            info!(grant_id = %reconciled.grant.id, "Adopted existing grant");
        }

        Ok(FolderAccessState {
            grant_id: reconciled.grant.id,
            content_metadata_id: spec.content_metadata_id.clone(),
            principal: spec.principal.clone(),
            level: reconciled.grant.level,
            origin: reconciled.origin,
        })
    }

    #[instrument(skip(self, state), fields(grant_id = %state.grant_id))]
    async fn read(&self, state: &FolderAccessState) -> ReconcileResult<Observed<FolderAccessState>> {
        let found = self
            .grants
            .locator()
            .find(&state.content_metadata_id, &state.principal)
            .await?;

        match found {
            Some(grant) => Ok(Observed::Present(FolderAccessState {
                grant_id: grant.id,
                level: grant.level,
                ..state.clone()
            })),
            None => {
                warn!(
                    "Folder access grant for {} on content {} not found, dropping it from tracking",
                    state.principal, state.content_metadata_id
                );
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(grant_id = %state.grant_id))]
    async fn update(
        &self,
        spec: &FolderAccessSpec,
        state: &FolderAccessState,
    ) -> ReconcileResult<FolderAccessState> {
        if !state.targets(spec) {
            info!("Grant target changed, replacing grant");
            self.delete(state).await?;
            return self.create(spec).await;
        }

        let reconciled = self
            .grants
            .reconcile(&spec.content_metadata_id, &spec.principal, spec.level)
            .await?;
        let origin = match reconciled.action {
            GrantAction::Created => GrantOrigin::Created,
            GrantAction::Unchanged | GrantAction::Updated => state.origin,
        };

        Ok(FolderAccessState {
            grant_id: reconciled.grant.id,
            level: reconciled.grant.level,
            origin,
            ..state.clone()
        })
    }

    #[instrument(skip(self, state), fields(grant_id = %state.grant_id, origin = %state.origin))]
    async fn delete(&self, state: &FolderAccessState) -> ReconcileResult<Teardown> {
        match self.api.delete_grant(&state.grant_id).await {
            Ok(()) => info!("Deleted {} grant", state.origin),
            Err(e) if e.is_not_found() => debug!("Grant already gone"),
            Err(e) => return Err(e.into()),
        }
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<FolderAccessState> {
        let (content_metadata_id, principal) = parse_grant_target(id)?;
        let grant = self
            .grants
            .locator()
            .find(&content_metadata_id, &principal)
            .await?
            .ok_or_else(|| ReconcileError::not_found("folder access grant", id))?;

        Ok(FolderAccessState {
            grant_id: grant.id,
            content_metadata_id,
            principal,
            level: grant.level,
            origin: GrantOrigin::Adopted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looker_client::MemoryLooker;

    fn spec(level: PermissionLevel) -> FolderAccessSpec {
        FolderAccessSpec {
            content_metadata_id: "40".to_string(),
            principal: Principal::group("7"),
            level,
        }
    }

    #[tokio::test]
    async fn test_create_records_origin() {
        let looker = MemoryLooker::new_shared();
        let reconciler = FolderAccessReconciler::new(looker.clone());

        let state = reconciler.create(&spec(PermissionLevel::View)).await.unwrap();
        assert_eq!(state.origin, GrantOrigin::Created);

        let other = looker
            .seed_grant("41", Principal::group("7"), PermissionLevel::View)
            .await;
        let adopted = reconciler
            .create(&FolderAccessSpec {
                content_metadata_id: "41".to_string(),
                ..spec(PermissionLevel::View)
            })
            .await
            .unwrap();
        assert_eq!(adopted.origin, GrantOrigin::Adopted);
        assert_eq!(adopted.grant_id, other.id);
    }

    #[tokio::test]
    async fn test_read_refreshes_level_and_detects_deletion() {
        let looker = MemoryLooker::new_shared();
        let reconciler = FolderAccessReconciler::new(looker.clone());
        let state = reconciler.create(&spec(PermissionLevel::View)).await.unwrap();

        looker
            .update_grant(&state.grant_id, PermissionLevel::Edit)
            .await
            .unwrap();
        let observed = reconciler.read(&state).await.unwrap().present().unwrap();
        assert_eq!(observed.level, PermissionLevel::Edit);
        assert_eq!(observed.origin, GrantOrigin::Created);

        looker.delete_grant(&state.grant_id).await.unwrap();
        assert_eq!(
            reconciler.read(&state).await.unwrap(),
            Observed::Vanished(DriftReason::Deleted)
        );
    }

    #[tokio::test]
    async fn test_import_adopts_located_grant() {
        let looker = MemoryLooker::new_shared();
        let grant = looker
            .seed_grant("40", Principal::user("9"), PermissionLevel::Edit)
            .await;
        let reconciler = FolderAccessReconciler::new(looker.clone());

        let state = reconciler.import("40/user:9").await.unwrap();
        assert_eq!(state.grant_id, grant.id);
        assert_eq!(state.origin, GrantOrigin::Adopted);

        let err = reconciler.import("40").await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidSpec(_)));
        let err = reconciler.import("40/group:1").await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound { .. }));
    }
}
