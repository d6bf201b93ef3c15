//! Looker API 4.0 JSON shapes.
//!
//! Looker returns most fields as nullable; these DTOs absorb the nulls and
//! translate into the model types.

use crate::api::{ApiError, ApiResult};
use looker_model::{
    AccessGrant, ContentMetadata, Folder, Group, ModelSet, PermissionLevel, PermissionSet,
    Principal, Role, User,
};
use serde::{Deserialize, Serialize};

/// Response from `POST /login`.
#[derive(Debug, Deserialize)]
pub(crate) struct AccessToken {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// `ContentMetaGroupUser`: a folder access grant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ContentMetaGroupUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_metadata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ContentMetaGroupUser {
    /// Request body for a new grant.
    pub fn create(content_metadata_id: &str, principal: &Principal, level: PermissionLevel) -> Self {
        let mut body = Self {
            content_metadata_id: Some(content_metadata_id.to_string()),
            permission_type: Some(level.as_str().to_string()),
            ..Default::default()
        };
        match principal {
            Principal::Group(id) => body.group_id = Some(id.to_string()),
            Principal::User(id) => body.user_id = Some(id.to_string()),
        }
        body
    }

    /// Request body for a level change.
    pub fn level(level: PermissionLevel) -> Self {
        Self {
            permission_type: Some(level.as_str().to_string()),
            ..Default::default()
        }
    }

    /// Translate into a model grant. `fallback_cm_id` fills a missing
    /// content-metadata ID when the caller knows it.
    pub fn into_grant(self, fallback_cm_id: Option<&str>) -> ApiResult<AccessGrant> {
        let id = self
            .id
            .ok_or_else(|| ApiError::InvalidResponse("grant without id".to_string()))?;
        let content_metadata_id = self
            .content_metadata_id
            .or_else(|| fallback_cm_id.map(str::to_string))
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("grant {} without content_metadata_id", id))
            })?;
        let principal = match (self.group_id, self.user_id) {
            (Some(group_id), _) => Principal::group(group_id),
            (None, Some(user_id)) => Principal::user(user_id),
            (None, None) => {
                return Err(ApiError::InvalidResponse(format!(
                    "grant {} has neither group_id nor user_id",
                    id
                )))
            }
        };
        let raw_level = self.permission_type.unwrap_or_default();
        let level = PermissionLevel::parse(&raw_level).ok_or_else(|| {
            ApiError::InvalidResponse(format!(
                "grant {} has unknown permission_type {:?}",
                id, raw_level
            ))
        })?;
        Ok(AccessGrant {
            id,
            content_metadata_id,
            principal,
            level,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_count: Option<i64>,
}

impl From<GroupDto> for Group {
    fn from(dto: GroupDto) -> Self {
        Group {
            id: dto.id.into(),
            name: dto.name.unwrap_or_default(),
            user_count: dto.user_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDto {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        User {
            id: dto.id.into(),
            email: dto.email,
            display_name: dto.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FolderDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub content_metadata_id: Option<String>,
    #[serde(default)]
    pub is_personal: Option<bool>,
}

impl TryFrom<FolderDto> for Folder {
    type Error = ApiError;

    fn try_from(dto: FolderDto) -> ApiResult<Self> {
        let content_metadata_id = dto.content_metadata_id.ok_or_else(|| {
            ApiError::InvalidResponse(format!("folder {} without content_metadata_id", dto.id))
        })?;
        Ok(Folder {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
            parent_id: dto.parent_id,
            content_metadata_id,
            is_personal: dto.is_personal.unwrap_or(false),
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateFolderBody<'a> {
    pub name: &'a str,
    pub parent_id: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ContentMetaDto {
    #[serde(default)]
    pub inherits: Option<bool>,
}

impl From<ContentMetaDto> for ContentMetadata {
    fn from(dto: ContentMetaDto) -> Self {
        // A missing flag reads as not inheriting.
        ContentMetadata {
            inherits: dto.inherits.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PermissionSetDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub built_in: Option<bool>,
    #[serde(default)]
    pub all_access: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<PermissionSetDto> for PermissionSet {
    fn from(dto: PermissionSetDto) -> Self {
        PermissionSet {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
            permissions: dto.permissions.unwrap_or_default().into_iter().collect(),
            built_in: dto.built_in.unwrap_or(false),
            all_access: dto.all_access.unwrap_or(false),
            url: dto.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelSetDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub built_in: Option<bool>,
    #[serde(default)]
    pub all_access: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<ModelSetDto> for ModelSet {
    fn from(dto: ModelSetDto) -> Self {
        ModelSet {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
            models: dto.models.unwrap_or_default().into_iter().collect(),
            built_in: dto.built_in.unwrap_or(false),
            all_access: dto.all_access.unwrap_or(false),
            url: dto.url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdRef {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleDto {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permission_set: Option<IdRef>,
    #[serde(default)]
    pub permission_set_id: Option<String>,
    #[serde(default)]
    pub model_set: Option<IdRef>,
    #[serde(default)]
    pub model_set_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<RoleDto> for Role {
    fn from(dto: RoleDto) -> Self {
        Role {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
            permission_set_id: dto
                .permission_set
                .and_then(|r| r.id)
                .or(dto.permission_set_id),
            model_set_id: dto.model_set.and_then(|r| r.id).or(dto.model_set_id),
            url: dto.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_dto_group_principal() {
        let dto: ContentMetaGroupUser = serde_json::from_value(serde_json::json!({
            "id": "31",
            "content_metadata_id": "7",
            "permission_type": "view",
            "group_id": "4",
            "user_id": null
        }))
        .unwrap();
        let grant = dto.into_grant(None).unwrap();
        assert_eq!(grant.principal, Principal::group("4"));
        assert_eq!(grant.level, PermissionLevel::View);
        assert_eq!(grant.content_metadata_id, "7");
    }

    #[test]
    fn test_grant_dto_rejects_unknown_level() {
        let dto = ContentMetaGroupUser {
            id: Some("1".to_string()),
            content_metadata_id: Some("7".to_string()),
            permission_type: Some("own".to_string()),
            group_id: Some("4".to_string()),
            user_id: None,
        };
        assert!(matches!(dto.into_grant(None), Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_grant_create_body_for_user() {
        let body = ContentMetaGroupUser::create("7", &Principal::user("9"), PermissionLevel::Edit);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "content_metadata_id": "7",
                "permission_type": "edit",
                "user_id": "9"
            })
        );
    }

    #[test]
    fn test_role_dto_reads_nested_sets() {
        let dto: RoleDto = serde_json::from_value(serde_json::json!({
            "id": "2",
            "name": "Analyst",
            "permission_set": {"id": "5", "name": "ps"},
            "model_set": {"id": "6"},
            "url": null
        }))
        .unwrap();
        let role = Role::from(dto);
        assert_eq!(role.permission_set_id.as_deref(), Some("5"));
        assert_eq!(role.model_set_id.as_deref(), Some("6"));
    }

    #[test]
    fn test_folder_dto_defaults_nullable_fields() {
        let dto: FolderDto = serde_json::from_value(serde_json::json!({
            "id": "11",
            "name": "Finance",
            "parent_id": "1",
            "content_metadata_id": "40",
            "is_personal": null
        }))
        .unwrap();
        let folder = Folder::try_from(dto).unwrap();
        assert!(!folder.is_personal);
        assert_eq!(folder.content_metadata_id, "40");
    }
}
