//! One reconciler per managed Looker kind.
//!
//! | Kind | Import ID |
//! |---|---|
//! | `permission_set`, `model_set`, `role`, `group`, `folder` | object ID |
//! | `role_groups` | role ID |
//! | `folder_access`, `folder_permission_override` | `<content_metadata_id>/<principal>` |
//!
//! A principal in an import ID is `group:<id>`, `user:<id>` or a bare group
//! ID.

pub mod folder;
pub mod folder_access;
pub mod folder_override;
pub mod group;
pub mod model_set;
pub mod permission_set;
pub mod role;
pub mod role_groups;

pub use folder::{FolderReconciler, FolderSpec, FolderState};
pub use folder_access::{FolderAccessReconciler, FolderAccessSpec, FolderAccessState};
pub use folder_override::{FolderOverrideReconciler, OverrideSpec, OverrideState};
pub use group::{GroupReconciler, GroupSpec, GroupState};
pub use model_set::{ModelSetReconciler, ModelSetSpec, ModelSetState};
pub use permission_set::{PermissionSetReconciler, PermissionSetSpec, PermissionSetState};
pub use role::{RoleReconciler, RoleSpec, RoleState};
pub use role_groups::{RoleGroupsReconciler, RoleGroupsSpec, RoleGroupsState};

use crate::error::{ReconcileError, ReconcileResult};
use looker_client::ApiResult;
use looker_model::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Managed kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    PermissionSet,
    ModelSet,
    Role,
    RoleGroups,
    Group,
    Folder,
    FolderAccess,
    FolderPermissionOverride,
}

impl ResourceKind {
    /// Every kind.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::PermissionSet,
        ResourceKind::ModelSet,
        ResourceKind::Role,
        ResourceKind::RoleGroups,
        ResourceKind::Group,
        ResourceKind::Folder,
        ResourceKind::FolderAccess,
        ResourceKind::FolderPermissionOverride,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::PermissionSet => "permission_set",
            ResourceKind::ModelSet => "model_set",
            ResourceKind::Role => "role",
            ResourceKind::RoleGroups => "role_groups",
            ResourceKind::Group => "group",
            ResourceKind::Folder => "folder",
            ResourceKind::FolderAccess => "folder_access",
            ResourceKind::FolderPermissionOverride => "folder_permission_override",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired configuration of any managed kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    PermissionSet(PermissionSetSpec),
    ModelSet(ModelSetSpec),
    Role(RoleSpec),
    RoleGroups(RoleGroupsSpec),
    Group(GroupSpec),
    Folder(FolderSpec),
    FolderAccess(FolderAccessSpec),
    FolderPermissionOverride(OverrideSpec),
}

impl ResourceSpec {
    /// The kind this spec declares.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::PermissionSet(_) => ResourceKind::PermissionSet,
            ResourceSpec::ModelSet(_) => ResourceKind::ModelSet,
            ResourceSpec::Role(_) => ResourceKind::Role,
            ResourceSpec::RoleGroups(_) => ResourceKind::RoleGroups,
            ResourceSpec::Group(_) => ResourceKind::Group,
            ResourceSpec::Folder(_) => ResourceKind::Folder,
            ResourceSpec::FolderAccess(_) => ResourceKind::FolderAccess,
            ResourceSpec::FolderPermissionOverride(_) => ResourceKind::FolderPermissionOverride,
        }
    }
}

/// Tracked state of any managed kind. Serializable so callers can persist
/// it between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceState {
    PermissionSet(PermissionSetState),
    ModelSet(ModelSetState),
    Role(RoleState),
    RoleGroups(RoleGroupsState),
    Group(GroupState),
    Folder(FolderState),
    FolderAccess(FolderAccessState),
    FolderPermissionOverride(OverrideState),
}

impl ResourceState {
    /// The kind of the tracked object.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceState::PermissionSet(_) => ResourceKind::PermissionSet,
            ResourceState::ModelSet(_) => ResourceKind::ModelSet,
            ResourceState::Role(_) => ResourceKind::Role,
            ResourceState::RoleGroups(_) => ResourceKind::RoleGroups,
            ResourceState::Group(_) => ResourceKind::Group,
            ResourceState::Folder(_) => ResourceKind::Folder,
            ResourceState::FolderAccess(_) => ResourceKind::FolderAccess,
            ResourceState::FolderPermissionOverride(_) => ResourceKind::FolderPermissionOverride,
        }
    }

    /// Looker ID of the tracked object.
    pub fn id(&self) -> &str {
        match self {
            ResourceState::PermissionSet(s) => &s.id,
            ResourceState::ModelSet(s) => &s.id,
            ResourceState::Role(s) => &s.id,
            ResourceState::RoleGroups(s) => &s.role_id,
            ResourceState::Group(s) => &s.id,
            ResourceState::Folder(s) => &s.id,
            ResourceState::FolderAccess(s) => &s.grant_id,
            ResourceState::FolderPermissionOverride(s) => &s.grant_id,
        }
    }
}

/// `Ok(None)` for a not-found response.
pub(crate) fn present<T>(result: ApiResult<T>) -> ReconcileResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Split a `<content_metadata_id>/<principal>` import ID.
pub(crate) fn parse_grant_target(id: &str) -> ReconcileResult<(String, Principal)> {
    let parsed = id
        .split_once('/')
        .filter(|(cm, _)| !cm.is_empty())
        .and_then(|(cm, principal)| Some((cm.to_string(), Principal::parse(principal)?)));

    parsed.ok_or_else(|| {
        ReconcileError::InvalidSpec(format!(
            "expected import ID of the form <content_metadata_id>/<principal>, got {:?}",
            id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use looker_client::ApiError;

    #[test]
    fn test_resource_kind_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::parse("dashboard"), None);
    }

    #[test]
    fn test_parse_grant_target() {
        let (cm, principal) = parse_grant_target("40/user:9").unwrap();
        assert_eq!(cm, "40");
        assert_eq!(principal, Principal::user("9"));

        let (_, principal) = parse_grant_target("40/7").unwrap();
        assert_eq!(principal, Principal::group("7"));

        for bad in ["40", "/7", "40/", "40/robot:1"] {
            assert!(parse_grant_target(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_present_maps_not_found() {
        assert_eq!(present::<u8>(Ok(1)).unwrap(), Some(1));
        assert_eq!(present::<u8>(Err(ApiError::not_found("role", "1"))).unwrap(), None);
        assert!(present::<u8>(Err(ApiError::InvalidResponse("x".into()))).is_err());
    }

    #[test]
    fn test_state_serializes_with_kind_tag() {
        let state = ResourceState::RoleGroups(RoleGroupsState {
            role_id: "3".to_string(),
            group_ids: ["1".to_string()].into_iter().collect(),
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["kind"], "role_groups");
        let back: ResourceState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
