//! Folder reconciler.

use super::{present, ResourceState};
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use async_trait::async_trait;
use looker_client::{LookerApi, WriteFolder};
use looker_model::Folder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Desired folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSpec {
    /// Folder name.
    pub name: String,
    /// Parent folder ID.
    pub parent_id: String,
    /// Whether the folder inherits access from its parent. `None` leaves
    /// Looker's setting alone.
    #[serde(default)]
    pub inherits_permissions: Option<bool>,
}

/// Tracked folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderState {
    /// Looker folder ID.
    pub id: String,
    /// Folder name.
    pub name: String,
    /// Parent folder ID.
    pub parent_id: Option<String>,
    /// Access-control context holding the folder's grants.
    pub content_metadata_id: String,
    /// Whether the folder inherits access from its parent.
    pub inherits: bool,
    /// Whether this is a user's personal folder.
    pub is_personal: bool,
}

impl FolderState {
    fn new(folder: Folder, inherits: bool) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            parent_id: folder.parent_id,
            content_metadata_id: folder.content_metadata_id,
            inherits,
            is_personal: folder.is_personal,
        }
    }
}

/// Reconciles folders and their inheritance flag.
#[derive(Clone)]
pub struct FolderReconciler {
    api: Arc<dyn LookerApi>,
}

impl FolderReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }

    async fn observe(&self, id: &str) -> ReconcileResult<Option<FolderState>> {
        let Some(folder) = present(self.api.get_folder(id).await)? else {
            return Ok(None);
        };
        let meta = self
            .api
            .get_content_metadata(&folder.content_metadata_id)
            .await?;
        Ok(Some(FolderState::new(folder, meta.inherits)))
    }
}

#[async_trait]
impl Reconciler for FolderReconciler {
    type Spec = FolderSpec;
    type State = FolderState;

    #[instrument(skip(self, spec), fields(name = %spec.name, parent_id = %spec.parent_id))]
    async fn create(&self, spec: &FolderSpec) -> ReconcileResult<FolderState> {
        let folder = self.api.create_folder(&spec.name, &spec.parent_id).await?;
        info!(folder_id = %folder.id, "Created folder");

        let meta = match spec.inherits_permissions {
            Some(false) => self
                .api
                .set_inheritance(&folder.content_metadata_id, false)
                .await
                .map(|meta| {
                    info!(folder_id = %folder.id, "Disabled permission inheritance");
                    meta
                }),
            _ => {
                self.api
                    .get_content_metadata(&folder.content_metadata_id)
                    .await
            }
        };

        match meta {
            Ok(meta) => Ok(FolderState::new(folder, meta.inherits)),
            Err(e) => {
                warn!(folder_id = %folder.id, "Folder created but inheritance not settled");
                // New folders inherit; the next read observes the real flag.
                let state = FolderState::new(folder, true);
                Err(ReconcileError::incomplete_create(ResourceState::Folder(state), e.into()))
            }
        }
    }

    #[instrument(skip(self, state), fields(folder_id = %state.id))]
    async fn read(&self, state: &FolderState) -> ReconcileResult<Observed<FolderState>> {
        match self.observe(&state.id).await? {
            Some(observed) => Ok(Observed::Present(observed)),
            None => {
                warn!("Folder {} not found, dropping it from tracking", state.id);
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(folder_id = %state.id))]
    async fn update(&self, spec: &FolderSpec, state: &FolderState) -> ReconcileResult<FolderState> {
        let mut next = state.clone();

        let change = WriteFolder {
            name: (spec.name != state.name).then(|| spec.name.clone()),
            parent_id: (state.parent_id.as_deref() != Some(spec.parent_id.as_str()))
                .then(|| spec.parent_id.clone()),
        };
        if !change.is_empty() {
            let folder = self.api.update_folder(&state.id, &change).await?;
            info!("Updated folder");
            next = FolderState::new(folder, state.inherits);
        }

        match spec.inherits_permissions {
            Some(inherits) if inherits != state.inherits => {
                let meta = self
                    .api
                    .set_inheritance(&state.content_metadata_id, inherits)
                    .await?;
                info!("Set permission inheritance to {}", inherits);
                next.inherits = meta.inherits;
            }
            _ => debug!("Permission inheritance unchanged"),
        }

        Ok(next)
    }

    #[instrument(skip(self, state), fields(folder_id = %state.id))]
    async fn delete(&self, state: &FolderState) -> ReconcileResult<Teardown> {
        self.api.delete_folder(&state.id).await?;
        info!("Deleted folder");
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<FolderState> {
        self.observe(id)
            .await?
            .ok_or_else(|| ReconcileError::not_found("folder", id))
    }
}
