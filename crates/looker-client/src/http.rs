//! Looker API 4.0 HTTP client.
//!
//! Authenticates with API3 credentials (`POST /login`), caches the access
//! token until shortly before it expires, and maps responses onto
//! [`ApiError`]. A request rejected with 401 logs in again and is retried
//! once.

use crate::api::{
    ApiError, ApiResult, LookerApi, WriteFolder, WriteModelSet, WritePermissionSet, WriteRole,
};
use crate::config::LookerConfig;
use crate::wire::{
    AccessToken, ContentMetaDto, ContentMetaGroupUser, CreateFolderBody, FolderDto, GroupDto,
    ModelSetDto, PermissionSetDto, RoleDto, UserDto,
};
use async_trait::async_trait;
use looker_model::{
    AccessGrant, ContentMetadata, Folder, Group, ModelSet, PermissionLevel, PermissionSet,
    Principal, PrincipalId, Role, User,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Tokens are refreshed this long before Looker expires them.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// An access token and when it stops being usable.
#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn new(token: AccessToken) -> Self {
        let expires_at = token.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs).saturating_sub(TOKEN_REFRESH_MARGIN)
        });
        Self {
            value: token.access_token,
            expires_at,
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Looker API client.
///
/// Cloning is cheap and clones share the cached access token.
#[derive(Clone)]
pub struct LookerClient {
    /// HTTP client instance.
    client: Client,

    /// Connection settings.
    config: LookerConfig,

    /// Access token from the last successful login.
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl LookerClient {
    /// Create a client. No request is made until the first API call.
    pub fn new(config: LookerConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            client,
            config,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Create a client and fail fast on bad credentials by fetching the
    /// authenticated user.
    pub async fn connect(config: LookerConfig) -> ApiResult<Self> {
        let client = Self::new(config)?;
        let me = client.me().await?;
        info!(user_id = %me.id, "Connected to Looker");
        Ok(client)
    }

    /// The authenticated API user.
    #[instrument(skip(self))]
    pub async fn me(&self) -> ApiResult<User> {
        let request = self.client.get(self.config.api_url("user"));
        let dto: UserDto = self.send(request, "user", "me").await?;
        Ok(dto.into())
    }

    /// Log in with the configured API3 credentials.
    #[instrument(skip(self))]
    async fn login(&self) -> ApiResult<CachedToken> {
        let (Some(client_id), Some(client_secret)) =
            (&self.config.client_id, &self.config.client_secret)
        else {
            error!("Looker credentials are not configured");
            return Err(ApiError::AuthenticationFailed);
        };

        debug!("Logging in to {}", self.config.base_url);
        let response = self
            .client
            .post(self.config.api_url("login"))
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;

        let response = Self::check_status(response, "login", "").await?;
        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        debug!(expires_in = ?token.expires_in, "Logged in");
        Ok(CachedToken::new(token))
    }

    /// Cached access token, logging in on first use and after expiry.
    async fn token(&self) -> ApiResult<String> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }
        let token = self.login().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Drop `rejected` from the cache unless another task already replaced it.
    async fn invalidate(&self, rejected: &str) {
        let mut guard = self.token.write().await;
        if guard.as_ref().map_or(false, |t| t.value == rejected) {
            *guard = None;
        }
    }

    /// Send `request` with the access token. On 401 log in again and retry
    /// once.
    async fn execute(&self, request: RequestBuilder) -> ApiResult<Response> {
        let retry = request.try_clone();
        let token = self.token().await?;
        let response = request
            .header(AUTHORIZATION, format!("token {}", token))
            .send()
            .await?;

        match retry {
            Some(retry) if response.status() == StatusCode::UNAUTHORIZED => {
                warn!("Looker rejected the access token, logging in again");
                self.invalidate(&token).await;
                let token = self.token().await?;
                Ok(retry
                    .header(AUTHORIZATION, format!("token {}", token))
                    .send()
                    .await?)
            }
            _ => Ok(response),
        }
    }

    /// Send an authorized request and decode the JSON body.
    async fn send<T>(&self, request: RequestBuilder, resource: &str, id: &str) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(request).await?;
        let response = Self::check_status(response, resource, id).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Send an authorized request whose body is ignored.
    async fn send_empty(&self, request: RequestBuilder, resource: &str, id: &str) -> ApiResult<()> {
        let response = self.execute(request).await?;
        Self::check_status(response, resource, id).await?;
        Ok(())
    }

    /// Map non-success statuses onto [`ApiError`].
    async fn check_status(response: Response, resource: &str, id: &str) -> ApiResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            error!("Looker authentication failed");
            return Err(ApiError::AuthenticationFailed);
        }

        if status == StatusCode::NOT_FOUND {
            debug!(resource, id, "Looker object not found");
            return Err(ApiError::not_found(resource, id));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Looker API error ({}): {}", status.as_u16(), message);
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        self.config.api_url(path)
    }
}

#[async_trait]
impl LookerApi for LookerClient {
    #[instrument(skip(self))]
    async fn search_users_by_email(&self, email: &str) -> ApiResult<Vec<User>> {
        let request = self
            .client
            .get(self.url("users/search"))
            .query(&[("email", email), ("fields", "id,email,display_name")]);
        let users: Vec<UserDto> = self.send(request, "user", email).await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_grants(&self, content_metadata_id: &str) -> ApiResult<Vec<AccessGrant>> {
        let request = self
            .client
            .get(self.url("content_metadata_access"))
            .query(&[("content_metadata_id", content_metadata_id)]);
        let grants: Vec<ContentMetaGroupUser> = self
            .send(request, "content_metadata", content_metadata_id)
            .await?;
        grants
            .into_iter()
            .map(|g| g.into_grant(Some(content_metadata_id)))
            .collect()
    }

    #[instrument(skip(self), fields(principal = %principal))]
    async fn create_grant(
        &self,
        content_metadata_id: &str,
        principal: &Principal,
        level: PermissionLevel,
    ) -> ApiResult<AccessGrant> {
        let body = ContentMetaGroupUser::create(content_metadata_id, principal, level);
        let request = self
            .client
            .post(self.url("content_metadata_access"))
            .query(&[("send_boards_notification_email", "false")])
            .json(&body);
        let grant: ContentMetaGroupUser = self
            .send(request, "content_metadata", content_metadata_id)
            .await?;
        grant.into_grant(Some(content_metadata_id))
    }

    #[instrument(skip(self))]
    async fn update_grant(&self, grant_id: &str, level: PermissionLevel) -> ApiResult<AccessGrant> {
        let request = self
            .client
            .patch(self.url(&format!("content_metadata_access/{}", grant_id)))
            .json(&ContentMetaGroupUser::level(level));
        let grant: ContentMetaGroupUser = self
            .send(request, "content_metadata_access", grant_id)
            .await?;
        grant.into_grant(None)
    }

    #[instrument(skip(self))]
    async fn delete_grant(&self, grant_id: &str) -> ApiResult<()> {
        let request = self
            .client
            .delete(self.url(&format!("content_metadata_access/{}", grant_id)));
        self.send_empty(request, "content_metadata_access", grant_id)
            .await
    }

    #[instrument(skip(self))]
    async fn create_group(&self, name: &str) -> ApiResult<Group> {
        let request = self
            .client
            .post(self.url("groups"))
            .json(&serde_json::json!({ "name": name }));
        let group: GroupDto = self.send(request, "group", name).await?;
        Ok(group.into())
    }

    #[instrument(skip(self))]
    async fn get_group(&self, group_id: &str) -> ApiResult<Group> {
        let request = self
            .client
            .get(self.url(&format!("groups/{}", group_id)))
            .query(&[("fields", "id,name,user_count")]);
        let group: GroupDto = self.send(request, "group", group_id).await?;
        Ok(group.into())
    }

    #[instrument(skip(self))]
    async fn update_group(&self, group_id: &str, name: &str) -> ApiResult<Group> {
        let request = self
            .client
            .patch(self.url(&format!("groups/{}", group_id)))
            .json(&serde_json::json!({ "name": name }));
        let group: GroupDto = self.send(request, "group", group_id).await?;
        Ok(group.into())
    }

    #[instrument(skip(self))]
    async fn delete_group(&self, group_id: &str) -> ApiResult<()> {
        let request = self.client.delete(self.url(&format!("groups/{}", group_id)));
        self.send_empty(request, "group", group_id).await
    }

    #[instrument(skip(self))]
    async fn search_groups(&self, name: &str) -> ApiResult<Vec<Group>> {
        let request = self
            .client
            .get(self.url("groups/search"))
            .query(&[("name", name), ("fields", "id,name,user_count")]);
        let groups: Vec<GroupDto> = self.send(request, "group", name).await?;
        Ok(groups.into_iter().map(Group::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_group_users(&self, group_id: &str) -> ApiResult<Vec<User>> {
        let request = self
            .client
            .get(self.url(&format!("groups/{}/users", group_id)))
            .query(&[("fields", "id,email,display_name")]);
        let users: Vec<UserDto> = self.send(request, "group", group_id).await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn add_group_user(&self, group_id: &str, user_id: &PrincipalId) -> ApiResult<()> {
        let request = self
            .client
            .post(self.url(&format!("groups/{}/users", group_id)))
            .json(&serde_json::json!({ "user_id": user_id }));
        self.send_empty(request, "group", group_id).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn remove_group_user(&self, group_id: &str, user_id: &PrincipalId) -> ApiResult<()> {
        let request = self
            .client
            .delete(self.url(&format!("groups/{}/users/{}", group_id, user_id)));
        self.send_empty(request, "group user", &format!("{}/{}", group_id, user_id))
            .await
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, name: &str, parent_id: &str) -> ApiResult<Folder> {
        let request = self
            .client
            .post(self.url("folders"))
            .json(&CreateFolderBody { name, parent_id });
        let folder: FolderDto = self.send(request, "folder", parent_id).await?;
        folder.try_into()
    }

    #[instrument(skip(self))]
    async fn get_folder(&self, folder_id: &str) -> ApiResult<Folder> {
        let request = self
            .client
            .get(self.url(&format!("folders/{}", folder_id)))
            .query(&[("fields", "id,name,parent_id,content_metadata_id,is_personal")]);
        let folder: FolderDto = self.send(request, "folder", folder_id).await?;
        folder.try_into()
    }

    #[instrument(skip(self, update))]
    async fn update_folder(&self, folder_id: &str, update: &WriteFolder) -> ApiResult<Folder> {
        let request = self
            .client
            .patch(self.url(&format!("folders/{}", folder_id)))
            .json(update);
        let folder: FolderDto = self.send(request, "folder", folder_id).await?;
        folder.try_into()
    }

    #[instrument(skip(self))]
    async fn delete_folder(&self, folder_id: &str) -> ApiResult<()> {
        let request = self.client.delete(self.url(&format!("folders/{}", folder_id)));
        self.send_empty(request, "folder", folder_id).await
    }

    #[instrument(skip(self))]
    async fn search_folders(&self, name: &str, parent_id: &str) -> ApiResult<Vec<Folder>> {
        let request = self
            .client
            .get(self.url("folders/search"))
            .query(&[("name", name), ("parent_id", parent_id)]);
        let folders: Vec<FolderDto> = self.send(request, "folder", name).await?;
        folders.into_iter().map(Folder::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_content_metadata(&self, content_metadata_id: &str) -> ApiResult<ContentMetadata> {
        let request = self
            .client
            .get(self.url(&format!("content_metadata/{}", content_metadata_id)))
            .query(&[("fields", "inherits")]);
        let meta: ContentMetaDto = self
            .send(request, "content_metadata", content_metadata_id)
            .await?;
        Ok(meta.into())
    }

    #[instrument(skip(self))]
    async fn set_inheritance(
        &self,
        content_metadata_id: &str,
        inherits: bool,
    ) -> ApiResult<ContentMetadata> {
        let request = self
            .client
            .patch(self.url(&format!("content_metadata/{}", content_metadata_id)))
            .json(&ContentMetaDto {
                inherits: Some(inherits),
            });
        let meta: ContentMetaDto = self
            .send(request, "content_metadata", content_metadata_id)
            .await?;
        Ok(meta.into())
    }

    #[instrument(skip(self, body))]
    async fn create_permission_set(&self, body: &WritePermissionSet) -> ApiResult<PermissionSet> {
        let request = self.client.post(self.url("permission_sets")).json(body);
        let set: PermissionSetDto = self.send(request, "permission_set", "").await?;
        Ok(set.into())
    }

    #[instrument(skip(self))]
    async fn get_permission_set(&self, id: &str) -> ApiResult<PermissionSet> {
        let request = self
            .client
            .get(self.url(&format!("permission_sets/{}", id)));
        let set: PermissionSetDto = self.send(request, "permission_set", id).await?;
        Ok(set.into())
    }

    #[instrument(skip(self, body))]
    async fn update_permission_set(
        &self,
        id: &str,
        body: &WritePermissionSet,
    ) -> ApiResult<PermissionSet> {
        let request = self
            .client
            .patch(self.url(&format!("permission_sets/{}", id)))
            .json(body);
        let set: PermissionSetDto = self.send(request, "permission_set", id).await?;
        Ok(set.into())
    }

    #[instrument(skip(self))]
    async fn delete_permission_set(&self, id: &str) -> ApiResult<()> {
        let request = self
            .client
            .delete(self.url(&format!("permission_sets/{}", id)));
        self.send_empty(request, "permission_set", id).await
    }

    #[instrument(skip(self))]
    async fn search_permission_sets(&self, name: &str) -> ApiResult<Vec<PermissionSet>> {
        let request = self
            .client
            .get(self.url("permission_sets/search"))
            .query(&[("name", name)]);
        let sets: Vec<PermissionSetDto> = self.send(request, "permission_set", name).await?;
        Ok(sets.into_iter().map(PermissionSet::from).collect())
    }

    #[instrument(skip(self, body))]
    async fn create_model_set(&self, body: &WriteModelSet) -> ApiResult<ModelSet> {
        let request = self.client.post(self.url("model_sets")).json(body);
        let set: ModelSetDto = self.send(request, "model_set", "").await?;
        Ok(set.into())
    }

    #[instrument(skip(self))]
    async fn get_model_set(&self, id: &str) -> ApiResult<ModelSet> {
        let request = self.client.get(self.url(&format!("model_sets/{}", id)));
        let set: ModelSetDto = self.send(request, "model_set", id).await?;
        Ok(set.into())
    }

    #[instrument(skip(self, body))]
    async fn update_model_set(&self, id: &str, body: &WriteModelSet) -> ApiResult<ModelSet> {
        let request = self
            .client
            .patch(self.url(&format!("model_sets/{}", id)))
            .json(body);
        let set: ModelSetDto = self.send(request, "model_set", id).await?;
        Ok(set.into())
    }

    #[instrument(skip(self))]
    async fn delete_model_set(&self, id: &str) -> ApiResult<()> {
        let request = self.client.delete(self.url(&format!("model_sets/{}", id)));
        self.send_empty(request, "model_set", id).await
    }

    #[instrument(skip(self))]
    async fn search_model_sets(&self, name: &str) -> ApiResult<Vec<ModelSet>> {
        let request = self
            .client
            .get(self.url("model_sets/search"))
            .query(&[("name", name)]);
        let sets: Vec<ModelSetDto> = self.send(request, "model_set", name).await?;
        Ok(sets.into_iter().map(ModelSet::from).collect())
    }

    #[instrument(skip(self, body))]
    async fn create_role(&self, body: &WriteRole) -> ApiResult<Role> {
        let request = self.client.post(self.url("roles")).json(body);
        let role: RoleDto = self.send(request, "role", "").await?;
        Ok(role.into())
    }

    #[instrument(skip(self))]
    async fn get_role(&self, id: &str) -> ApiResult<Role> {
        let request = self.client.get(self.url(&format!("roles/{}", id)));
        let role: RoleDto = self.send(request, "role", id).await?;
        Ok(role.into())
    }

    #[instrument(skip(self, body))]
    async fn update_role(&self, id: &str, body: &WriteRole) -> ApiResult<Role> {
        let request = self
            .client
            .patch(self.url(&format!("roles/{}", id)))
            .json(body);
        let role: RoleDto = self.send(request, "role", id).await?;
        Ok(role.into())
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, id: &str) -> ApiResult<()> {
        let request = self.client.delete(self.url(&format!("roles/{}", id)));
        self.send_empty(request, "role", id).await
    }

    #[instrument(skip(self))]
    async fn search_roles(&self, name: &str) -> ApiResult<Vec<Role>> {
        let request = self
            .client
            .get(self.url("roles/search"))
            .query(&[("name", name)]);
        let roles: Vec<RoleDto> = self.send(request, "role", name).await?;
        Ok(roles.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self))]
    async fn role_groups(&self, role_id: &str) -> ApiResult<Vec<Group>> {
        let request = self
            .client
            .get(self.url(&format!("roles/{}/groups", role_id)))
            .query(&[("fields", "id,name")]);
        let groups: Vec<GroupDto> = self.send(request, "role", role_id).await?;
        Ok(groups.into_iter().map(Group::from).collect())
    }

    #[instrument(skip(self))]
    async fn set_role_groups(&self, role_id: &str, group_ids: &[String]) -> ApiResult<Vec<Group>> {
        let request = self
            .client
            .put(self.url(&format!("roles/{}/groups", role_id)))
            .json(group_ids);
        let groups: Vec<GroupDto> = self.send(request, "role", role_id).await?;
        Ok(groups.into_iter().map(Group::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_is_lazy() {
        let config = LookerConfig::default()
            .with_base_url("https://acme.looker.com")
            .with_credentials("id", "secret");
        let client = LookerClient::new(config).unwrap();
        assert_eq!(client.url("/groups"), "https://acme.looker.com/api/4.0/groups");
    }

    #[tokio::test]
    async fn test_login_without_credentials_fails() {
        let config = LookerConfig::default().with_base_url("https://acme.looker.com");
        let client = LookerClient::new(config).unwrap();
        assert!(matches!(
            client.login().await,
            Err(ApiError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_token_freshness_follows_expiry() {
        let token = |expires_in| {
            CachedToken::new(AccessToken {
                access_token: "tok".to_string(),
                expires_in,
            })
        };
        assert!(token(None).is_fresh());
        assert!(token(Some(3600)).is_fresh());
        assert!(!token(Some(30)).is_fresh());
        assert!(!token(Some(0)).is_fresh());
    }
}
