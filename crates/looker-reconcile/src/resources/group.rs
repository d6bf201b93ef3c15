//! Group reconciler.
//!
//! Desired membership is the union of explicit user IDs and user emails
//! resolved through [`IdentityResolver`]. Emails are write-only: tracked
//! state records the resolved IDs, never the emails.

use super::{present, ResourceState};
use crate::driver::{DriftReason, Observed, Reconciler, Teardown};
use crate::error::{ReconcileError, ReconcileResult};
use crate::identity::IdentityResolver;
use crate::membership::{apply_membership, MembershipDiff};
use async_trait::async_trait;
use looker_client::LookerApi;
use looker_model::PrincipalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Desired group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group name.
    pub name: String,
    /// Members by user ID.
    #[serde(default)]
    pub user_ids: BTreeSet<PrincipalId>,
    /// Members by email.
    #[serde(default)]
    pub user_emails: BTreeSet<String>,
}

/// Tracked group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    /// Looker ID.
    pub id: String,
    /// Group name.
    pub name: String,
    /// Direct member user IDs.
    pub member_ids: BTreeSet<PrincipalId>,
}

/// Reconciles groups and their direct membership.
#[derive(Clone)]
pub struct GroupReconciler {
    api: Arc<dyn LookerApi>,
    identities: IdentityResolver,
}

impl GroupReconciler {
    /// Create a reconciler over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self {
            identities: IdentityResolver::new(api.clone()),
            api,
        }
    }

    /// Desired member IDs: explicit IDs plus resolved emails.
    async fn desired_members(&self, spec: &GroupSpec) -> ReconcileResult<BTreeSet<PrincipalId>> {
        let mut members = self.identities.resolve_all(&spec.user_emails).await?;
        members.extend(spec.user_ids.iter().cloned());
        Ok(members)
    }

    async fn observe(&self, id: &str) -> ReconcileResult<Option<GroupState>> {
        let Some(group) = present(self.api.get_group(id).await)? else {
            return Ok(None);
        };
        let users = self.api.list_group_users(id).await?;
        Ok(Some(GroupState {
            id: group.id.into_inner(),
            name: group.name,
            member_ids: users.into_iter().map(|u| u.id).collect(),
        }))
    }
}

#[async_trait]
impl Reconciler for GroupReconciler {
    type Spec = GroupSpec;
    type State = GroupState;

    /// Resolves every email before creating anything, so an unknown or
    /// ambiguous email leaves Looker untouched.
    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn create(&self, spec: &GroupSpec) -> ReconcileResult<GroupState> {
        let members = self.desired_members(spec).await?;

        let group = self.api.create_group(&spec.name).await?;
        let id = group.id.into_inner();
        info!(group_id = %id, "Created group");

        let diff = MembershipDiff::between(&members, &BTreeSet::new());
        if let Err(e) = apply_membership(&*self.api, &id, &diff).await {
            let mut member_ids = BTreeSet::new();
            if let ReconcileError::PartiallyApplied { applied, .. } = &e {
                for change in applied {
                    change.apply_to(&mut member_ids);
                }
            }
            warn!(group_id = %id, "Group created but membership incomplete");
            let state = GroupState {
                id,
                name: group.name,
                member_ids,
            };
            return Err(ReconcileError::incomplete_create(ResourceState::Group(state), e));
        }

        Ok(GroupState {
            id,
            name: group.name,
            member_ids: members,
        })
    }

    #[instrument(skip(self, state), fields(group_id = %state.id))]
    async fn read(&self, state: &GroupState) -> ReconcileResult<Observed<GroupState>> {
        match self.observe(&state.id).await? {
            Some(observed) => Ok(Observed::Present(observed)),
            None => {
                warn!("Group {} not found, dropping it from tracking", state.id);
                Ok(Observed::Vanished(DriftReason::Deleted))
            }
        }
    }

    #[instrument(skip(self, spec, state), fields(group_id = %state.id))]
    async fn update(&self, spec: &GroupSpec, state: &GroupState) -> ReconcileResult<GroupState> {
        let members = self.desired_members(spec).await?;

        let mut name = state.name.clone();
        if spec.name != state.name {
            name = self.api.update_group(&state.id, &spec.name).await?.name;
            info!("Renamed group to {}", name);
        }

        let diff = MembershipDiff::between(&members, &state.member_ids);
        apply_membership(&*self.api, &state.id, &diff).await?;

        Ok(GroupState {
            id: state.id.clone(),
            name,
            member_ids: members,
        })
    }

    #[instrument(skip(self, state), fields(group_id = %state.id))]
    async fn delete(&self, state: &GroupState) -> ReconcileResult<Teardown> {
        self.api.delete_group(&state.id).await?;
        info!("Deleted group");
        Ok(Teardown::Deleted)
    }

    #[instrument(skip(self))]
    async fn import(&self, id: &str) -> ReconcileResult<GroupState> {
        self.observe(id)
            .await?
            .ok_or_else(|| ReconcileError::not_found("group", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looker_client::MemoryLooker;

    fn ids(xs: &[&str]) -> BTreeSet<PrincipalId> {
        xs.iter().map(|x| PrincipalId::new(*x)).collect()
    }

    async fn looker_with_users() -> Arc<MemoryLooker> {
        let looker = MemoryLooker::new_shared();
        for (id, email) in [
            ("u1", "u1@example.com"),
            ("u2", "u2@example.com"),
            ("u3", "u3@example.com"),
            ("u4", "u4@example.com"),
        ] {
            looker.seed_user(id, email).await;
        }
        looker
    }

    #[tokio::test]
    async fn test_create_unions_ids_and_emails() {
        let looker = looker_with_users().await;
        let reconciler = GroupReconciler::new(looker.clone());

        let state = reconciler
            .create(&GroupSpec {
                name: "analysts".to_string(),
                user_ids: ids(&["u1"]),
                user_emails: ["u2@example.com".to_string(), "u1@example.com".to_string()]
                    .into_iter()
                    .collect(),
            })
            .await
            .unwrap();

        assert_eq!(state.member_ids, ids(&["u1", "u2"]));
        assert_eq!(
            looker.members_of(&state.id).await,
            ["u1", "u2"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[tokio::test]
    async fn test_unknown_email_creates_nothing() {
        let looker = looker_with_users().await;
        let reconciler = GroupReconciler::new(looker.clone());

        let err = reconciler
            .create(&GroupSpec {
                name: "analysts".to_string(),
                user_emails: ["ghost@example.com".to_string()].into_iter().collect(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound { what: "user", .. }));
        assert_eq!(looker.mutation_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_applies_only_the_diff() {
        let looker = looker_with_users().await;
        let reconciler = GroupReconciler::new(looker.clone());
        let state = reconciler
            .create(&GroupSpec {
                name: "analysts".to_string(),
                user_ids: ids(&["u1", "u4"]),
                ..Default::default()
            })
            .await
            .unwrap();
        looker.clear_calls().await;

        let state = reconciler
            .update(
                &GroupSpec {
                    name: "analysts".to_string(),
                    user_ids: ids(&["u1", "u2", "u3"]),
                    ..Default::default()
                },
                &state,
            )
            .await
            .unwrap();

        assert_eq!(state.member_ids, ids(&["u1", "u2", "u3"]));
        let ops: Vec<_> = looker
            .calls()
            .await
            .into_iter()
            .filter(|c| c.mutating)
            .map(|c| (c.op, c.target))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("add_group_user", "u2".to_string()),
                ("add_group_user", "u3".to_string()),
                ("remove_group_user", "u4".to_string()),
            ]
        );
    }
}
