//! Grant location and reconciliation.
//!
//! Looker has no "grant for principal X" query, so [`GrantLocator`] lists
//! every grant on a content-metadata context and scans. Cost is linear in
//! the number of grants on the folder.

use crate::error::{ReconcileError, ReconcileResult};
use looker_client::LookerApi;
use looker_model::{AccessGrant, GrantOrigin, PermissionLevel, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Finds the grant a principal holds on a content-metadata context.
#[derive(Clone)]
pub struct GrantLocator {
    api: Arc<dyn LookerApi>,
}

impl GrantLocator {
    /// Create a locator over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }

    /// Find `principal`'s grant on `content_metadata_id`.
    ///
    /// Issues one `list_grants` call. Two grants for the same principal
    /// are reported as [`ReconcileError::InvariantViolation`].
    #[instrument(skip(self), fields(principal = %principal))]
    pub async fn find(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
    ) -> ReconcileResult<Option<AccessGrant>> {
        let grants = self.api.list_grants(content_metadata_id).await?;
        debug!("Scanning {} grants", grants.len());
        single_grant(grants, content_metadata_id, principal)
    }
}

fn single_grant(
    grants: Vec<AccessGrant>,
    content_metadata_id: &str,
    principal: &Principal,
) -> ReconcileResult<Option<AccessGrant>> {
    let mut matching = grants.into_iter().filter(|g| g.belongs_to(principal));
    let found = matching.next();

    if let (Some(first), Some(second)) = (&found, matching.next()) {
        warn!(
            "Content {} holds grants {} and {} for {}",
            content_metadata_id, first.id, second.id, principal
        );
        return Err(ReconcileError::InvariantViolation(format!(
            "content {} holds more than one grant for {} ({}, {})",
            content_metadata_id, principal, first.id, second.id
        )));
    }

    Ok(found)
}

/// What [`GrantReconciler::reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAction {
    /// No grant existed; one was created.
    Created,
    /// The grant already had the requested level.
    Unchanged,
    /// The grant's level was changed in place.
    Updated,
}

/// Outcome of reconciling one grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledGrant {
    /// The grant as it now stands.
    pub grant: AccessGrant,
    /// Whether the grant was minted by this call or found in place.
    pub origin: GrantOrigin,
    /// The remote action taken.
    pub action: GrantAction,
}

impl ReconciledGrant {
    /// Whether a mutating call was issued.
    pub fn mutated(&self) -> bool {
        self.action != GrantAction::Unchanged
    }
}

/// Brings a principal's grant on a context to a desired level.
#[derive(Clone)]
pub struct GrantReconciler {
    api: Arc<dyn LookerApi>,
    locator: GrantLocator,
}

impl GrantReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self {
            locator: GrantLocator::new(api.clone()),
            api,
        }
    }

    /// The locator used to find existing grants.
    pub fn locator(&self) -> &GrantLocator {
        &self.locator
    }

    /// Create, update or leave alone `principal`'s grant so it sits at
    /// `level`.
    ///
    /// Idempotent: a second call with the same level issues no mutation.
    #[instrument(skip(self), fields(principal = %principal))]
    pub async fn reconcile(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
        level: PermissionLevel,
    ) -> ReconcileResult<ReconciledGrant> {
        match self.locator.find(content_metadata_id, principal).await? {
            None => {
                let grant = self
                    .api
                    .create_grant(content_metadata_id, principal, level)
                    .await?;
                info!(grant_id = %grant.id, "Created {} grant", level);
                Ok(ReconciledGrant {
                    grant,
                    origin: GrantOrigin::Created,
                    action: GrantAction::Created,
                })
            }
            Some(grant) if grant.level == level => {
                debug!(grant_id = %grant.id, "Grant already at {}", level);
                Ok(ReconciledGrant {
                    grant,
                    origin: GrantOrigin::Adopted,
                    action: GrantAction::Unchanged,
                })
            }
            Some(existing) => {
                let grant = self.api.update_grant(&existing.id, level).await?;
                info!(
                    grant_id = %grant.id,
                    "Changed grant level from {} to {}", existing.level, level
                );
                Ok(ReconciledGrant {
                    grant,
                    origin: GrantOrigin::Adopted,
                    action: GrantAction::Updated,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use looker_client::MemoryLooker;

    #[tokio::test]
    async fn test_find_returns_unique_match() {
        let looker = MemoryLooker::new_shared();
        looker
            .seed_grant("40", Principal::group("1"), PermissionLevel::View)
            .await;
        let target = looker
            .seed_grant("40", Principal::group("2"), PermissionLevel::Edit)
            .await;
        looker
            .seed_grant("41", Principal::group("3"), PermissionLevel::View)
            .await;

        let locator = GrantLocator::new(looker.clone());
        let found = locator.find("40", &Principal::group("2")).await.unwrap();
        assert_eq!(found, Some(target));
    }

    #[tokio::test]
    async fn test_find_absent_among_many_uses_one_list_call() {
        let looker = MemoryLooker::new_shared();
        for i in 0..50 {
            looker
                .seed_grant("40", Principal::group(format!("g{}", i)), PermissionLevel::View)
                .await;
        }

        let locator = GrantLocator::new(looker.clone());
        let found = locator.find("40", &Principal::group("missing")).await.unwrap();
        assert!(found.is_none());

        let calls = looker.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].op, "list_grants");
    }

    #[tokio::test]
    async fn test_user_and_group_with_same_id_are_distinct() {
        let looker = MemoryLooker::new_shared();
        looker
            .seed_grant("40", Principal::user("5"), PermissionLevel::Edit)
            .await;

        let locator = GrantLocator::new(looker.clone());
        assert!(locator
            .find("40", &Principal::group("5"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_grants_are_an_invariant_violation() {
        let looker = MemoryLooker::new_shared();
        looker
            .seed_grant("40", Principal::group("7"), PermissionLevel::View)
            .await;
        looker
            .seed_grant("40", Principal::group("7"), PermissionLevel::Edit)
            .await;

        let locator = GrantLocator::new(looker.clone());
        let err = locator.find("40", &Principal::group("7")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[tokio::test]
    async fn test_reconcile_twice_mutates_once() {
        let looker = MemoryLooker::new_shared();
        let reconciler = GrantReconciler::new(looker.clone());
        let principal = Principal::group("7");

        let first = reconciler
            .reconcile("40", &principal, PermissionLevel::View)
            .await
            .unwrap();
        assert_eq!(first.action, GrantAction::Created);
        assert_eq!(first.origin, GrantOrigin::Created);

        let second = reconciler
            .reconcile("40", &principal, PermissionLevel::View)
            .await
            .unwrap();
        assert_eq!(second.action, GrantAction::Unchanged);
        assert_eq!(second.grant.id, first.grant.id);
        assert!(!second.mutated());

        assert_eq!(looker.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn test_reconcile_updates_level_in_place() {
        let looker = MemoryLooker::new_shared();
        let existing = looker
            .seed_grant("40", Principal::group("7"), PermissionLevel::View)
            .await;
        let reconciler = GrantReconciler::new(looker.clone());

        let result = reconciler
            .reconcile("40", &Principal::group("7"), PermissionLevel::Edit)
            .await
            .unwrap();
        assert_eq!(result.action, GrantAction::Updated);
        assert_eq!(result.origin, GrantOrigin::Adopted);
        assert_eq!(result.grant.id, existing.id);
        assert_eq!(result.grant.level, PermissionLevel::Edit);
        assert_eq!(looker.mutation_count().await, 1);
    }
}
