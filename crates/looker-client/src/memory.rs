//! In-memory Looker for testing and dry runs.
//!
//! Mirrors the Looker objects the reconcilers touch. Every [`LookerApi`] call
//! is appended to a journal so tests can assert on call counts, and calls
//! can be made to fail on demand to exercise partial-apply reporting.
//!
//! Grants are kept in insertion order and [`MemoryLooker::seed_grant`]
//! accepts duplicates per principal, so anomalous remote states can be
//! reproduced.

use crate::api::{
    ApiError, ApiResult, LookerApi, WriteFolder, WriteModelSet, WritePermissionSet, WriteRole,
};
use async_trait::async_trait;
use looker_model::{
    AccessGrant, ContentMetadata, Folder, Group, ModelSet, PermissionLevel, PermissionSet,
    Principal, PrincipalId, Role, User,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// One journaled API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// `LookerApi` method name, e.g. `update_grant`.
    pub op: &'static str,
    /// Primary argument of the call (an ID, name or email).
    pub target: String,
    /// Whether the call changes remote state.
    pub mutating: bool,
}

#[derive(Debug, Clone)]
struct Failure {
    op: String,
    target: Option<String>,
}

impl Failure {
    fn matches(&self, op: &str, target: &str) -> bool {
        op.starts_with(&self.op) && self.target.as_deref().map_or(true, |t| t == target)
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    members: BTreeMap<String, BTreeSet<String>>,
    folders: BTreeMap<String, Folder>,
    content: BTreeMap<String, ContentMetadata>,
    grants: Vec<AccessGrant>,
    permission_sets: BTreeMap<String, PermissionSet>,
    model_sets: BTreeMap<String, ModelSet>,
    roles: BTreeMap<String, Role>,
    role_groups: BTreeMap<String, BTreeSet<String>>,
    calls: Vec<CallRecord>,
    failures: Vec<Failure>,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn journal(&mut self, op: &'static str, target: &str, mutating: bool) -> ApiResult<()> {
        self.calls.push(CallRecord {
            op,
            target: target.to_string(),
            mutating,
        });
        if self.failures.iter().any(|f| f.matches(op, target)) {
            debug!(op, target, "Injected failure");
            return Err(ApiError::Api {
                status: 500,
                message: format!("injected failure: {} {}", op, target),
            });
        }
        Ok(())
    }

    fn read(&mut self, op: &'static str, target: &str) -> ApiResult<()> {
        self.journal(op, target, false)
    }

    fn write(&mut self, op: &'static str, target: &str) -> ApiResult<()> {
        self.journal(op, target, true)
    }

    fn group(&self, id: &str) -> ApiResult<Group> {
        let mut group = self
            .groups
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("group", id))?;
        group.user_count = Some(self.members.get(id).map_or(0, |m| m.len() as i64));
        Ok(group)
    }

    fn groups_of(&self, ids: &BTreeSet<String>) -> ApiResult<Vec<Group>> {
        ids.iter().map(|id| self.group(id)).collect()
    }

    fn user(&self, id: &str) -> User {
        self.users.get(id).cloned().unwrap_or_else(|| User {
            id: PrincipalId::new(id),
            email: None,
            display_name: None,
        })
    }

    fn grant_mut(&mut self, grant_id: &str) -> ApiResult<&mut AccessGrant> {
        self.grants
            .iter_mut()
            .find(|g| g.id == grant_id)
            .ok_or_else(|| ApiError::not_found("content_metadata_access", grant_id))
    }

    fn insert_folder(&mut self, name: &str, parent_id: Option<&str>, inherits: bool) -> Folder {
        let id = self.next_id();
        let content_metadata_id = self.next_id();
        let folder = Folder {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            content_metadata_id: content_metadata_id.clone(),
            is_personal: false,
        };
        self.content
            .insert(content_metadata_id, ContentMetadata { inherits });
        self.folders.insert(id, folder.clone());
        folder
    }

    fn require_folder(&self, id: &str) -> ApiResult<()> {
        if self.folders.contains_key(id) {
            Ok(())
        } else {
            Err(ApiError::not_found("folder", id))
        }
    }
}

fn conflict(message: impl Into<String>) -> ApiError {
    ApiError::Api {
        status: 409,
        message: message.into(),
    }
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::Api {
        status: 422,
        message: message.into(),
    }
}

/// In-memory implementation of [`LookerApi`].
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLooker {
    state: Arc<RwLock<State>>,
}

impl MemoryLooker {
    /// Create an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty instance wrapped in `Arc`.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a user. Duplicate emails are allowed.
    pub async fn seed_user(&self, id: &str, email: &str) -> User {
        let user = User::new(id, email);
        self.state
            .write()
            .await
            .users
            .insert(id.to_string(), user.clone());
        user
    }

    /// Add a group with the given members, bypassing the journal.
    pub async fn seed_group(&self, name: &str, member_ids: &[&str]) -> Group {
        let mut state = self.state.write().await;
        let id = state.next_id();
        state.groups.insert(id.clone(), Group::new(id.as_str(), name));
        state.members.insert(
            id.clone(),
            member_ids.iter().map(|m| m.to_string()).collect(),
        );
        let mut group = Group::new(id.as_str(), name);
        group.user_count = Some(member_ids.len() as i64);
        group
    }

    /// Add a folder, bypassing the journal.
    pub async fn seed_folder(&self, name: &str, parent_id: Option<&str>, inherits: bool) -> Folder {
        self.state
            .write()
            .await
            .insert_folder(name, parent_id, inherits)
    }

    /// Add a grant, bypassing the journal and the one-grant-per-principal
    /// check.
    pub async fn seed_grant(
        &self,
        content_metadata_id: &str,
        principal: Principal,
        level: PermissionLevel,
    ) -> AccessGrant {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let grant = AccessGrant::new(id, content_metadata_id, principal, level);
        state.grants.push(grant.clone());
        grant
    }

    /// Current grants on a context, bypassing the journal.
    pub async fn grants_on(&self, content_metadata_id: &str) -> Vec<AccessGrant> {
        self.state
            .read()
            .await
            .grants
            .iter()
            .filter(|g| g.content_metadata_id == content_metadata_id)
            .cloned()
            .collect()
    }

    /// Current member IDs of a group, bypassing the journal.
    pub async fn members_of(&self, group_id: &str) -> BTreeSet<String> {
        self.state
            .read()
            .await
            .members
            .get(group_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every call whose method name starts with `op` fail with a 500.
    pub async fn fail_on(&self, op: &str) {
        self.state.write().await.failures.push(Failure {
            op: op.to_string(),
            target: None,
        });
    }

    /// Make calls to `op` with the given primary argument fail with a 500.
    pub async fn fail_on_target(&self, op: &str, target: &str) {
        self.state.write().await.failures.push(Failure {
            op: op.to_string(),
            target: Some(target.to_string()),
        });
    }

    /// Remove all injected failures.
    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<CallRecord> {
        self.state.read().await.calls.clone()
    }

    /// Number of state-changing calls made so far, failed ones included.
    pub async fn mutation_count(&self) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| c.mutating)
            .count()
    }

    /// Forget the journal.
    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }
}

#[async_trait]
impl LookerApi for MemoryLooker {
    #[instrument(skip(self))]
    async fn search_users_by_email(&self, email: &str) -> ApiResult<Vec<User>> {
        let mut state = self.state.write().await;
        state.read("search_users_by_email", email)?;
        Ok(state
            .users
            .values()
            .filter(|u| {
                u.email
                    .as_deref()
                    .map_or(false, |e| e.eq_ignore_ascii_case(email))
            })
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_grants(&self, content_metadata_id: &str) -> ApiResult<Vec<AccessGrant>> {
        let mut state = self.state.write().await;
        state.read("list_grants", content_metadata_id)?;
        Ok(state
            .grants
            .iter()
            .filter(|g| g.content_metadata_id == content_metadata_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self), fields(principal = %principal))]
    async fn create_grant(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
        level: PermissionLevel,
    ) -> ApiResult<AccessGrant> {
        let mut state = self.state.write().await;
        state.write("create_grant", content_metadata_id)?;
        if state
            .grants
            .iter()
            .any(|g| g.content_metadata_id == content_metadata_id && g.belongs_to(principal))
        {
            return Err(conflict(format!(
                "{} already has access to content {}",
                principal, content_metadata_id
            )));
        }
        let id = state.next_id();
        let grant = AccessGrant::new(id, content_metadata_id, principal.clone(), level);
        state.grants.push(grant.clone());
        Ok(grant)
    }

    #[instrument(skip(self))]
    async fn update_grant(&self, grant_id: &str, level: PermissionLevel) -> ApiResult<AccessGrant> {
        let mut state = self.state.write().await;
        state.write("update_grant", grant_id)?;
        let grant = state.grant_mut(grant_id)?;
        grant.level = level;
        Ok(grant.clone())
    }

    #[instrument(skip(self))]
    async fn delete_grant(&self, grant_id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("delete_grant", grant_id)?;
        let before = state.grants.len();
        state.grants.retain(|g| g.id != grant_id);
        if state.grants.len() == before {
            return Err(ApiError::not_found("content_metadata_access", grant_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_group(&self, name: &str) -> ApiResult<Group> {
        let mut state = self.state.write().await;
        state.write("create_group", name)?;
        if state.groups.values().any(|g| g.name == name) {
            return Err(conflict(format!("group {} already exists", name)));
        }
        let id = state.next_id();
        state.groups.insert(id.clone(), Group::new(id.as_str(), name));
        state.members.insert(id.clone(), BTreeSet::new());
        state.group(&id)
    }

    #[instrument(skip(self))]
    async fn get_group(&self, group_id: &str) -> ApiResult<Group> {
        let mut state = self.state.write().await;
        state.read("get_group", group_id)?;
        state.group(group_id)
    }

    #[instrument(skip(self))]
    async fn update_group(&self, group_id: &str, name: &str) -> ApiResult<Group> {
        let mut state = self.state.write().await;
        state.write("update_group", group_id)?;
        let group = state
            .groups
            .get_mut(group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?;
        group.name = name.to_string();
        state.group(group_id)
    }

    #[instrument(skip(self))]
    async fn delete_group(&self, group_id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("delete_group", group_id)?;
        state
            .groups
            .remove(group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?;
        state.members.remove(group_id);
        for holders in state.role_groups.values_mut() {
            holders.remove(group_id);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_groups(&self, name: &str) -> ApiResult<Vec<Group>> {
        let mut state = self.state.write().await;
        state.read("search_groups", name)?;
        let ids: BTreeSet<String> = state
            .groups
            .values()
            .filter(|g| g.name == name)
            .map(|g| g.id.to_string())
            .collect();
        state.groups_of(&ids)
    }

    #[instrument(skip(self))]
    async fn list_group_users(&self, group_id: &str) -> ApiResult<Vec<User>> {
        let mut state = self.state.write().await;
        state.read("list_group_users", group_id)?;
        let members = state
            .members
            .get(group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?;
        Ok(members.iter().map(|id| state.user(id)).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn add_group_user(&self, group_id: &str, user_id: &PrincipalId) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("add_group_user", user_id.as_str())?;
        if !state.users.contains_key(user_id.as_str()) {
            return Err(ApiError::not_found("user", user_id.as_str()));
        }
        state
            .members
            .get_mut(group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?
            .insert(user_id.to_string());
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn remove_group_user(&self, group_id: &str, user_id: &PrincipalId) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("remove_group_user", user_id.as_str())?;
        let members = state
            .members
            .get_mut(group_id)
            .ok_or_else(|| ApiError::not_found("group", group_id))?;
        if !members.remove(user_id.as_str()) {
            return Err(ApiError::not_found(
                "group user",
                format!("{}/{}", group_id, user_id),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, name: &str, parent_id: &str) -> ApiResult<Folder> {
        let mut state = self.state.write().await;
        state.write("create_folder", name)?;
        state.require_folder(parent_id)?;
        if state
            .folders
            .values()
            .any(|f| f.name == name && f.parent_id.as_deref() == Some(parent_id))
        {
            return Err(conflict(format!(
                "folder {} already exists in {}",
                name, parent_id
            )));
        }
        Ok(state.insert_folder(name, Some(parent_id), true))
    }

    #[instrument(skip(self))]
    async fn get_folder(&self, folder_id: &str) -> ApiResult<Folder> {
        let mut state = self.state.write().await;
        state.read("get_folder", folder_id)?;
        state
            .folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("folder", folder_id))
    }

    #[instrument(skip(self, update))]
    async fn update_folder(&self, folder_id: &str, update: &WriteFolder) -> ApiResult<Folder> {
        let mut state = self.state.write().await;
        state.write("update_folder", folder_id)?;
        if let Some(parent_id) = &update.parent_id {
            if parent_id == folder_id {
                return Err(validation("a folder cannot be its own parent"));
            }
            state.require_folder(parent_id)?;
        }
        let folder = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| ApiError::not_found("folder", folder_id))?;
        if let Some(name) = &update.name {
            folder.name = name.clone();
        }
        if let Some(parent_id) = &update.parent_id {
            folder.parent_id = Some(parent_id.clone());
        }
        Ok(folder.clone())
    }

    #[instrument(skip(self))]
    async fn delete_folder(&self, folder_id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("delete_folder", folder_id)?;
        let folder = state
            .folders
            .remove(folder_id)
            .ok_or_else(|| ApiError::not_found("folder", folder_id))?;
        state.content.remove(&folder.content_metadata_id);
        state
            .grants
            .retain(|g| g.content_metadata_id != folder.content_metadata_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_folders(&self, name: &str, parent_id: &str) -> ApiResult<Vec<Folder>> {
        let mut state = self.state.write().await;
        state.read("search_folders", name)?;
        Ok(state
            .folders
            .values()
            .filter(|f| f.name == name && f.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_content_metadata(&self, content_metadata_id: &str) -> ApiResult<ContentMetadata> {
        let mut state = self.state.write().await;
        state.read("get_content_metadata", content_metadata_id)?;
        state
            .content
            .get(content_metadata_id)
            .copied()
            .ok_or_else(|| ApiError::not_found("content_metadata", content_metadata_id))
    }

    #[instrument(skip(self))]
    async fn set_inheritance(
        &self,
        content_metadata_id: &str,
        inherits: bool,
    ) -> ApiResult<ContentMetadata> {
        let mut state = self.state.write().await;
        state.write("set_inheritance", content_metadata_id)?;
        let meta = state
            .content
            .get_mut(content_metadata_id)
            .ok_or_else(|| ApiError::not_found("content_metadata", content_metadata_id))?;
        meta.inherits = inherits;
        Ok(*meta)
    }

    #[instrument(skip(self, body))]
    async fn create_permission_set(&self, body: &WritePermissionSet) -> ApiResult<PermissionSet> {
        let mut state = self.state.write().await;
        let name = body
            .name
            .clone()
            .ok_or_else(|| validation("permission set name is required"))?;
        state.write("create_permission_set", &name)?;
        if state.permission_sets.values().any(|p| p.name == name) {
            return Err(conflict(format!("permission set {} already exists", name)));
        }
        let id = state.next_id();
        let set = PermissionSet {
            id: id.clone(),
            name,
            permissions: body.permissions.clone().unwrap_or_default(),
            built_in: false,
            all_access: false,
            url: Some(format!("/api/4.0/permission_sets/{}", id)),
        };
        state.permission_sets.insert(id, set.clone());
        Ok(set)
    }

    #[instrument(skip(self))]
    async fn get_permission_set(&self, id: &str) -> ApiResult<PermissionSet> {
        let mut state = self.state.write().await;
        state.read("get_permission_set", id)?;
        state
            .permission_sets
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("permission_set", id))
    }

    #[instrument(skip(self, body))]
    async fn update_permission_set(
        &self,
        id: &str,
        body: &WritePermissionSet,
    ) -> ApiResult<PermissionSet> {
        let mut state = self.state.write().await;
        state.write("update_permission_set", id)?;
        let set = state
            .permission_sets
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found("permission_set", id))?;
        if let Some(name) = &body.name {
            set.name = name.clone();
        }
        if let Some(permissions) = &body.permissions {
            set.permissions = permissions.clone();
        }
        Ok(set.clone())
    }

    #[instrument(skip(self))]
    async fn delete_permission_set(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("delete_permission_set", id)?;
        state
            .permission_sets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("permission_set", id))
    }

    #[instrument(skip(self))]
    async fn search_permission_sets(&self, name: &str) -> ApiResult<Vec<PermissionSet>> {
        let mut state = self.state.write().await;
        state.read("search_permission_sets", name)?;
        Ok(state
            .permission_sets
            .values()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, body))]
    async fn create_model_set(&self, body: &WriteModelSet) -> ApiResult<ModelSet> {
        let mut state = self.state.write().await;
        let name = body
            .name
            .clone()
            .ok_or_else(|| validation("model set name is required"))?;
        state.write("create_model_set", &name)?;
        if state.model_sets.values().any(|m| m.name == name) {
            return Err(conflict(format!("model set {} already exists", name)));
        }
        let id = state.next_id();
        let set = ModelSet {
            id: id.clone(),
            name,
            models: body.models.clone().unwrap_or_default(),
            built_in: false,
            all_access: false,
            url: Some(format!("/api/4.0/model_sets/{}", id)),
        };
        state.model_sets.insert(id, set.clone());
        Ok(set)
    }

    #[instrument(skip(self))]
    async fn get_model_set(&self, id: &str) -> ApiResult<ModelSet> {
        let mut state = self.state.write().await;
        state.read("get_model_set", id)?;
        state
            .model_sets
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("model_set", id))
    }

    #[instrument(skip(self, body))]
    async fn update_model_set(&self, id: &str, body: &WriteModelSet) -> ApiResult<ModelSet> {
        let mut state = self.state.write().await;
        state.write("update_model_set", id)?;
        let set = state
            .model_sets
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found("model_set", id))?;
        if let Some(name) = &body.name {
            set.name = name.clone();
        }
        if let Some(models) = &body.models {
            set.models = models.clone();
        }
        Ok(set.clone())
    }

    #[instrument(skip(self))]
    async fn delete_model_set(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("delete_model_set", id)?;
        state
            .model_sets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("model_set", id))
    }

    #[instrument(skip(self))]
    async fn search_model_sets(&self, name: &str) -> ApiResult<Vec<ModelSet>> {
        let mut state = self.state.write().await;
        state.read("search_model_sets", name)?;
        Ok(state
            .model_sets
            .values()
            .filter(|m| m.name == name)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, body))]
    async fn create_role(&self, body: &WriteRole) -> ApiResult<Role> {
        let mut state = self.state.write().await;
        let name = body
            .name
            .clone()
            .ok_or_else(|| validation("role name is required"))?;
        state.write("create_role", &name)?;
        if let Some(ps) = &body.permission_set_id {
            if !state.permission_sets.contains_key(ps) {
                return Err(ApiError::not_found("permission_set", ps.as_str()));
            }
        }
        if let Some(ms) = &body.model_set_id {
            if !state.model_sets.contains_key(ms) {
                return Err(ApiError::not_found("model_set", ms.as_str()));
            }
        }
        let id = state.next_id();
        let role = Role {
            id: id.clone(),
            name,
            permission_set_id: body.permission_set_id.clone(),
            model_set_id: body.model_set_id.clone(),
            url: Some(format!("/api/4.0/roles/{}", id)),
        };
        state.roles.insert(id.clone(), role.clone());
        state.role_groups.insert(id, BTreeSet::new());
        Ok(role)
    }

    #[instrument(skip(self))]
    async fn get_role(&self, id: &str) -> ApiResult<Role> {
        let mut state = self.state.write().await;
        state.read("get_role", id)?;
        state
            .roles
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("role", id))
    }

    #[instrument(skip(self, body))]
    async fn update_role(&self, id: &str, body: &WriteRole) -> ApiResult<Role> {
        let mut state = self.state.write().await;
        state.write("update_role", id)?;
        let role = state
            .roles
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found("role", id))?;
        if let Some(name) = &body.name {
            role.name = name.clone();
        }
        if body.permission_set_id.is_some() {
            role.permission_set_id = body.permission_set_id.clone();
        }
        if body.model_set_id.is_some() {
            role.model_set_id = body.model_set_id.clone();
        }
        Ok(role.clone())
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.write("delete_role", id)?;
        state
            .roles
            .remove(id)
            .ok_or_else(|| ApiError::not_found("role", id))?;
        state.role_groups.remove(id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_roles(&self, name: &str) -> ApiResult<Vec<Role>> {
        let mut state = self.state.write().await;
        state.read("search_roles", name)?;
        Ok(state
            .roles
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn role_groups(&self, role_id: &str) -> ApiResult<Vec<Group>> {
        let mut state = self.state.write().await;
        state.read("role_groups", role_id)?;
        let ids = state
            .role_groups
            .get(role_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("role", role_id))?;
        state.groups_of(&ids)
    }

    #[instrument(skip(self))]
    async fn set_role_groups(&self, role_id: &str, group_ids: &[String]) -> ApiResult<Vec<Group>> {
        let mut state = self.state.write().await;
        state.write("set_role_groups", role_id)?;
        if !state.roles.contains_key(role_id) {
            return Err(ApiError::not_found("role", role_id));
        }
        let ids: BTreeSet<String> = group_ids.iter().cloned().collect();
        let groups = state.groups_of(&ids)?;
        state.role_groups.insert(role_id.to_string(), ids);
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_lifecycle_keeps_id() {
        let looker = MemoryLooker::new();
        let grant = looker
            .create_grant("7", &Principal::group("4"), PermissionLevel::View)
            .await
            .unwrap();
        let updated = looker
            .update_grant(&grant.id, PermissionLevel::Edit)
            .await
            .unwrap();
        assert_eq!(updated.id, grant.id);
        assert_eq!(updated.level, PermissionLevel::Edit);

        looker.delete_grant(&grant.id).await.unwrap();
        assert!(looker.list_grants("7").await.unwrap().is_empty());
        assert_eq!(looker.mutation_count().await, 3);
    }

    #[tokio::test]
    async fn test_duplicate_grant_is_rejected() {
        let looker = MemoryLooker::new();
        let principal = Principal::user("9");
        looker
            .create_grant("7", &principal, PermissionLevel::View)
            .await
            .unwrap();
        let err = looker
            .create_grant("7", &principal, PermissionLevel::Edit)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 409, .. }));

        looker.seed_grant("7", principal, PermissionLevel::Edit).await;
        assert_eq!(looker.grants_on("7").await.len(), 2);
    }

    #[tokio::test]
    async fn test_email_search_is_case_insensitive() {
        let looker = MemoryLooker::new();
        looker.seed_user("u1", "Ann@Example.com").await;
        looker.seed_user("u2", "bob@example.com").await;

        let users = looker.search_users_by_email("ann@example.com").await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_unknown_user_cannot_join_group() {
        let looker = MemoryLooker::new();
        let group = looker.create_group("analysts").await.unwrap();
        let err = looker
            .add_group_user(group.id.as_str(), &PrincipalId::new("ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failure_injection_is_journaled() {
        let looker = MemoryLooker::new();
        looker.seed_user("u1", "a@example.com").await;
        let group = looker.seed_group("g", &[]).await;
        looker.fail_on_target("add_group_user", "u1").await;

        let result = looker
            .add_group_user(group.id.as_str(), &PrincipalId::new("u1"))
            .await;
        assert!(matches!(result, Err(ApiError::Api { status: 500, .. })));
        assert_eq!(looker.mutation_count().await, 1);
        assert!(looker.members_of(group.id.as_str()).await.is_empty());

        looker.clear_failures().await;
        looker
            .add_group_user(group.id.as_str(), &PrincipalId::new("u1"))
            .await
            .unwrap();
        assert_eq!(looker.members_of(group.id.as_str()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_folder_drops_its_grants() {
        let looker = MemoryLooker::new();
        let root = looker.seed_folder("Shared", None, false).await;
        let folder = looker.create_folder("Finance", &root.id).await.unwrap();
        assert!(
            looker
                .get_content_metadata(&folder.content_metadata_id)
                .await
                .unwrap()
                .inherits
        );
        looker
            .create_grant(
                &folder.content_metadata_id,
                &Principal::group("4"),
                PermissionLevel::View,
            )
            .await
            .unwrap();

        looker.delete_folder(&folder.id).await.unwrap();
        assert!(looker.grants_on(&folder.content_metadata_id).await.is_empty());
        assert!(looker.get_folder(&folder.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_set_role_groups_replaces_list() {
        let looker = MemoryLooker::new();
        let ps = looker
            .create_permission_set(&WritePermissionSet {
                name: Some("viewers".to_string()),
                permissions: Some(["access_data".to_string()].into_iter().collect()),
            })
            .await
            .unwrap();
        let role = looker
            .create_role(&WriteRole {
                name: Some("Viewer".to_string()),
                permission_set_id: Some(ps.id.clone()),
                model_set_id: None,
            })
            .await
            .unwrap();
        let a = looker.seed_group("a", &[]).await;
        let b = looker.seed_group("b", &[]).await;

        looker
            .set_role_groups(&role.id, &[a.id.to_string(), b.id.to_string()])
            .await
            .unwrap();
        looker
            .set_role_groups(&role.id, &[b.id.to_string()])
            .await
            .unwrap();
        let held = looker.role_groups(&role.id).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].id, b.id);
    }
}
