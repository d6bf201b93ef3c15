//! Folder permission overrides.
//!
//! An override converts a grant a principal already holds on a folder,
//! typically inherited from a parent, into a direct grant at a new level. It
//! never creates a grant: with nothing to convert it fails with
//! [`ReconcileError::NoInheritedGrantToOverride`] before any mutation.
//!
//! Releasing an override leaves the converted grant as it is. Looker has no
//! call that restores inheritance for a single grant, so reverting is left
//! to the operator.

use crate::driver::{DriftReason, Observed, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use crate::grants::GrantLocator;
use chrono::{DateTime, Utc};
use looker_client::LookerApi;
use looker_model::{AccessGrant, PermissionLevel, Principal};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A successfully converted grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOverride {
    /// The grant after conversion. Its ID is the one that was located.
    pub grant: AccessGrant,
    /// Level the grant had before conversion.
    pub previous_level: PermissionLevel,
    /// When the conversion was issued.
    pub converted_at: DateTime<Utc>,
}

/// Seek, convert, verify and release for folder permission overrides.
#[derive(Clone)]
pub struct OverrideWorkflow {
    api: Arc<dyn LookerApi>,
    locator: GrantLocator,
}

impl OverrideWorkflow {
    /// Create a workflow over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self {
            locator: GrantLocator::new(api.clone()),
            api,
        }
    }

    /// Locate `principal`'s grant and set it to `level`.
    ///
    /// Always issues exactly one update once a grant is found, even if the
    /// grant is already at `level`: the update is what makes it direct.
    #[instrument(skip(self), fields(principal = %principal))]
    pub async fn apply(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
        level: PermissionLevel,
    ) -> ReconcileResult<AppliedOverride> {
        let existing = self
            .locator
            .find(content_metadata_id, principal)
            .await?
            .ok_or_else(|| ReconcileError::NoInheritedGrantToOverride {
                content_metadata_id: content_metadata_id.to_string(),
                principal: principal.clone(),
            })?;

        let grant = self.api.update_grant(&existing.id, level).await?;
        info!(
            grant_id = %grant.id,
            "Converted grant from {} to {}", existing.level, grant.level
        );

        Ok(AppliedOverride {
            grant,
            previous_level: existing.level,
            converted_at: Utc::now(),
        })
    }

    /// Re-locate the grant and check it still carries `level`.
    ///
    /// A missing grant or a changed level is drift, reported as
    /// [`Observed::Vanished`] rather than silently re-applied.
    #[instrument(skip(self), fields(principal = %principal))]
    pub async fn verify(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
        level: PermissionLevel,
    ) -> ReconcileResult<Observed<AccessGrant>> {
        match self.locator.find(content_metadata_id, principal).await? {
            None => {
                warn!("Permission override no longer exists; it will be re-applied on the next run");
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
            Some(grant) if grant.level != level => {
                warn!(
                    grant_id = %grant.id,
                    "Permission override changed externally to {}; it will be re-applied on the next run",
                    grant.level
                );
                Ok(Observed::Vanished(DriftReason::ExternallyReverted))
            }
            Some(grant) => Ok(Observed::Present(grant)),
        }
    }

    /// Stop tracking an override. Issues no remote call.
    pub fn release(&self, content_metadata_id: &str, principal: &Principal) -> Teardown {
        warn!(
            principal = %principal,
            "Releasing the permission override on content {} does not revert it to inherited \
             permissions; manage the grant in Looker if reversion is needed",
            content_metadata_id
        );
        Teardown::Released
    }
}
