//! Read-only lookups of existing Looker objects.
//!
//! Each lookup takes an ID or a name. When both are given the ID wins. A
//! name must match exactly one object.

use crate::error::{ReconcileError, ReconcileResult};
use looker_client::LookerApi;
use looker_model::{Folder, Group, ModelSet, PermissionSet, PrincipalId, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Lookup key for permission sets, model sets, roles and groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupQuery {
    /// Looker ID. Takes precedence over `name`.
    #[serde(default)]
    pub id: Option<String>,
    /// Exact name.
    #[serde(default)]
    pub name: Option<String>,
}

impl LookupQuery {
    /// Query by ID.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    /// Query by name.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// Lookup key for folders. Folder names are only unique under a parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderQuery {
    /// Folder ID. Takes precedence over `name`.
    #[serde(default)]
    pub id: Option<String>,
    /// Exact folder name. Requires `parent_id`.
    #[serde(default)]
    pub name: Option<String>,
    /// Parent folder to search under.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A group with its direct members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLookup {
    /// The group found.
    pub group: Group,
    /// Its direct member user IDs.
    pub member_ids: BTreeSet<PrincipalId>,
}

enum Key<'a> {
    Id(&'a str),
    Name(&'a str),
}

fn key(query: &LookupQuery) -> ReconcileResult<Key<'_>> {
    match (query.id.as_deref(), query.name.as_deref()) {
        (Some(id), _) => Ok(Key::Id(id)),
        (None, Some(name)) => Ok(Key::Name(name)),
        (None, None) => Err(ReconcileError::InvalidSpec(
            "You must provide either `id` or `name`".to_string(),
        )),
    }
}

/// Exactly one search hit.
fn single<T>(what: &'static str, key: &str, mut found: Vec<T>) -> ReconcileResult<T> {
    match found.len() {
        0 => Err(ReconcileError::not_found(what, key)),
        1 => Ok(found.remove(0)),
        n => {
            warn!("Name {} matches {} {}s", key, n, what);
            Err(ReconcileError::AmbiguousIdentity {
                what,
                key: key.to_string(),
                matches: n,
            })
        }
    }
}

/// Looks up existing objects without changing anything.
#[derive(Clone)]
pub struct Lookup {
    api: Arc<dyn LookerApi>,
}

impl Lookup {
    /// Create a lookup over `api`.
    pub fn new(api: Arc<dyn LookerApi>) -> Self {
        Self { api }
    }

    /// Find a permission set.
    #[instrument(skip(self))]
    pub async fn permission_set(&self, query: &LookupQuery) -> ReconcileResult<PermissionSet> {
        match key(query)? {
            Key::Id(id) => Ok(self.api.get_permission_set(id).await?),
            Key::Name(name) => single(
                "permission set",
                name,
                self.api.search_permission_sets(name).await?,
            ),
        }
    }

    /// Find a model set.
    #[instrument(skip(self))]
    pub async fn model_set(&self, query: &LookupQuery) -> ReconcileResult<ModelSet> {
        match key(query)? {
            Key::Id(id) => Ok(self.api.get_model_set(id).await?),
            Key::Name(name) => single("model set", name, self.api.search_model_sets(name).await?),
        }
    }

    /// Find a role.
    #[instrument(skip(self))]
    pub async fn role(&self, query: &LookupQuery) -> ReconcileResult<Role> {
        match key(query)? {
            Key::Id(id) => Ok(self.api.get_role(id).await?),
            Key::Name(name) => single("role", name, self.api.search_roles(name).await?),
        }
    }

    /// Find a group and list its direct members.
    #[instrument(skip(self))]
    pub async fn group(&self, query: &LookupQuery) -> ReconcileResult<GroupLookup> {
        let group = match key(query)? {
            Key::Id(id) => self.api.get_group(id).await?,
            Key::Name(name) => single("group", name, self.api.search_groups(name).await?)?,
        };
        let users = self.api.list_group_users(group.id.as_str()).await?;
        debug!(group_id = %group.id, members = users.len(), "Found group");

        Ok(GroupLookup {
            group,
            member_ids: users.into_iter().map(|u| u.id).collect(),
        })
    }

    /// Find a folder by ID, or by name under a parent.
    #[instrument(skip(self))]
    pub async fn folder(&self, query: &FolderQuery) -> ReconcileResult<Folder> {
        if let Some(id) = query.id.as_deref() {
            return Ok(self.api.get_folder(id).await?);
        }
        match (query.name.as_deref(), query.parent_id.as_deref()) {
            (Some(name), Some(parent_id)) => single(
                "folder",
                name,
                self.api.search_folders(name, parent_id).await?,
            ),
            _ => Err(ReconcileError::InvalidSpec(
                "You must provide either `id` or both `name` and `parent_id`".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use looker_client::{MemoryLooker, WritePermissionSet};

    #[tokio::test]
    async fn test_query_needs_id_or_name() {
        let lookup = Lookup::new(MemoryLooker::new_shared());
        let err = lookup.role(&LookupQuery::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);

        let err = lookup
            .folder(&FolderQuery {
                name: Some("Finance".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[tokio::test]
    async fn test_group_by_name_lists_members() {
        let looker = MemoryLooker::new_shared();
        looker.seed_user("u1", "u1@example.com").await;
        looker.seed_user("u2", "u2@example.com").await;
        let seeded = looker.seed_group("analysts", &["u1", "u2"]).await;
        let lookup = Lookup::new(looker.clone());

        let found = lookup.group(&LookupQuery::by_name("analysts")).await.unwrap();
        assert_eq!(found.group.id, seeded.id);
        assert_eq!(
            found.member_ids,
            [PrincipalId::new("u1"), PrincipalId::new("u2")].into_iter().collect()
        );

        let err = lookup.group(&LookupQuery::by_name("nobody")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_id_wins_over_name() {
        let looker = MemoryLooker::new_shared();
        let set = looker
            .create_permission_set(&WritePermissionSet {
                name: Some("viewers".to_string()),
                permissions: Some(["access_data".to_string()].into_iter().collect()),
            })
            .await
            .unwrap();
        let lookup = Lookup::new(looker.clone());

        let found = lookup
            .permission_set(&LookupQuery {
                id: Some(set.id.clone()),
                name: Some("something else".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(found.name, "viewers");
    }

    #[tokio::test]
    async fn test_folder_by_name_under_parent() {
        let looker = MemoryLooker::new_shared();
        let root = looker.seed_folder("Shared", None, false).await;
        let finance = looker.seed_folder("Finance", Some(&root.id), true).await;
        let lookup = Lookup::new(looker.clone());

        let found = lookup
            .folder(&FolderQuery {
                id: None,
                name: Some("Finance".to_string()),
                parent_id: Some(root.id.clone()),
            })
            .await
            .unwrap();
        assert_eq!(found.id, finance.id);
    }
}
