//! The Looker API boundary.
//!
//! Every reconciler talks to Looker through [`LookerApi`]. The trait mirrors
//! the coarse primitives Looker API 4.0 exposes; it offers no
//! upsert and no filtered grant query.

use async_trait::async_trait;
use looker_model::{
    AccessGrant, ContentMetadata, Folder, Group, ModelSet, PermissionLevel, PermissionSet,
    Principal, PrincipalId, Role, User,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Remote API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed object does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of object that was looked up.
        resource: String,
        /// The ID that was looked up.
        id: String,
    },

    /// Looker returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API, verbatim.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response could not be understood.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Login or token rejected.
    #[error("Authentication failed")]
    AuthenticationFailed,
}

impl ApiError {
    /// Build a not-found error.
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Whether this is the distinguishable "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for Looker API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Body for creating or updating a permission set. `None` fields are left
/// unchanged on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePermissionSet {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Permissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeSet<String>>,
}

/// Body for creating or updating a model set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteModelSet {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// LookML model names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<BTreeSet<String>>,
}

/// Body for creating or updating a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRole {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Permission set ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_set_id: Option<String>,

    /// Model set ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_set_id: Option<String>,
}

/// Body for updating a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFolder {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// New parent folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl WriteFolder {
    /// Whether the update carries no change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

/// Coarse Looker API 4.0 primitives.
///
/// Implementations must be usable from concurrent reconciliation units; each
/// call is an independent request/response exchange.
#[async_trait]
pub trait LookerApi: Send + Sync {
    // Users

    /// Search users by exact email.
    async fn search_users_by_email(&self, email: &str) -> ApiResult<Vec<User>>;

    // Folder access grants

    /// List every grant on a content-metadata context (no server-side filter).
    async fn list_grants(&self, content_metadata_id: &str) -> ApiResult<Vec<AccessGrant>>;

    /// Create a grant.
    async fn create_grant(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
        level: PermissionLevel,
    ) -> ApiResult<AccessGrant>;

    /// Change a grant's level in place. The grant ID is stable.
    async fn update_grant(&self, grant_id: &str, level: PermissionLevel) -> ApiResult<AccessGrant>;

    /// Delete a grant.
    async fn delete_grant(&self, grant_id: &str) -> ApiResult<()>;

    // Groups

    /// Create a group.
    async fn create_group(&self, name: &str) -> ApiResult<Group>;

    /// Fetch a group.
    async fn get_group(&self, group_id: &str) -> ApiResult<Group>;

    /// Rename a group.
    async fn update_group(&self, group_id: &str, name: &str) -> ApiResult<Group>;

    /// Delete a group.
    async fn delete_group(&self, group_id: &str) -> ApiResult<()>;

    /// Search groups by name.
    async fn search_groups(&self, name: &str) -> ApiResult<Vec<Group>>;

    /// List a group's direct users.
    async fn list_group_users(&self, group_id: &str) -> ApiResult<Vec<User>>;

    /// Add a user to a group.
    async fn add_group_user(&self, group_id: &str, user_id: &PrincipalId) -> ApiResult<()>;

    /// Remove a user from a group.
    async fn remove_group_user(&self, group_id: &str, user_id: &PrincipalId) -> ApiResult<()>;

    // Folders

    /// Create a folder under `parent_id`.
    async fn create_folder(&self, name: &str, parent_id: &str) -> ApiResult<Folder>;

    /// Fetch a folder.
    async fn get_folder(&self, folder_id: &str) -> ApiResult<Folder>;

    /// Rename or move a folder.
    async fn update_folder(&self, folder_id: &str, update: &WriteFolder) -> ApiResult<Folder>;

    /// Delete a folder.
    async fn delete_folder(&self, folder_id: &str) -> ApiResult<()>;

    /// Search folders by name within a parent.
    async fn search_folders(&self, name: &str, parent_id: &str) -> ApiResult<Vec<Folder>>;

    /// Fetch a folder's content metadata.
    async fn get_content_metadata(&self, content_metadata_id: &str) -> ApiResult<ContentMetadata>;

    /// Turn permission inheritance on or off.
    async fn set_inheritance(
        &self,
        content_metadata_id: &str,
        inherits: bool,
    ) -> ApiResult<ContentMetadata>;

    // Permission sets

    /// Create a permission set.
    async fn create_permission_set(&self, body: &WritePermissionSet) -> ApiResult<PermissionSet>;

    /// Fetch a permission set.
    async fn get_permission_set(&self, id: &str) -> ApiResult<PermissionSet>;

    /// Update a permission set.
    async fn update_permission_set(
        &self,
        id: &str,
        body: &WritePermissionSet,
    ) -> ApiResult<PermissionSet>;

    /// Delete a permission set.
    async fn delete_permission_set(&self, id: &str) -> ApiResult<()>;

    /// Search permission sets by name.
    async fn search_permission_sets(&self, name: &str) -> ApiResult<Vec<PermissionSet>>;

    // Model sets

    /// Create a model set.
    async fn create_model_set(&self, body: &WriteModelSet) -> ApiResult<ModelSet>;

    /// Fetch a model set.
    async fn get_model_set(&self, id: &str) -> ApiResult<ModelSet>;

    /// Update a model set.
    async fn update_model_set(&self, id: &str, body: &WriteModelSet) -> ApiResult<ModelSet>;

    /// Delete a model set.
    async fn delete_model_set(&self, id: &str) -> ApiResult<()>;

    /// Search model sets by name.
    async fn search_model_sets(&self, name: &str) -> ApiResult<Vec<ModelSet>>;

    // Roles

    /// Create a role.
    async fn create_role(&self, body: &WriteRole) -> ApiResult<Role>;

    /// Fetch a role.
    async fn get_role(&self, id: &str) -> ApiResult<Role>;

    /// Update a role.
    async fn update_role(&self, id: &str, body: &WriteRole) -> ApiResult<Role>;

    /// Delete a role.
    async fn delete_role(&self, id: &str) -> ApiResult<()>;

    /// Search roles by name.
    async fn search_roles(&self, name: &str) -> ApiResult<Vec<Role>>;

    /// Groups holding a role.
    async fn role_groups(&self, role_id: &str) -> ApiResult<Vec<Group>>;

    /// Replace the full set of groups holding a role.
    async fn set_role_groups(&self, role_id: &str, group_ids: &[String]) -> ApiResult<Vec<Group>>;
}
