//! HTTP client tests against a mocked Looker API 4.0.
//!
//! Covered:
//! 1. Login happens once and the token is sent on every call
//! 2. 404 maps to the distinguishable not-found error
//! 3. Grant JSON translates into model grants
//! 4. 401 and error bodies map onto `ApiError`
//! 5. Expired or rejected tokens trigger a fresh login

use looker_client::{ApiError, LookerApi, LookerClient, LookerConfig};
use looker_model::{PermissionLevel, Principal, PrincipalId};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Looker server with a login endpoint mounted.
struct TestFixture {
    server: MockServer,
    config: LookerConfig,
}

impl TestFixture {
    async fn new() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/4.0/login"))
            .and(body_string_contains("client_id=test-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = LookerConfig::default()
            .with_base_url(server.uri())
            .with_credentials("test-client", "test-secret")
            .with_timeout_secs(5);

        Self { server, config }
    }

    fn client(&self) -> LookerClient {
        LookerClient::new(self.config.clone()).unwrap()
    }
}

#[tokio::test]
async fn test_connect_logs_in_once_and_sends_token() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/api/4.0/user"))
        .and(header("Authorization", "token tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1",
            "email": "api@example.com",
            "display_name": "API User"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/4.0/users/search"))
        .and(query_param("email", "ann@example.com"))
        .and(header("Authorization", "token tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "42", "email": "ann@example.com", "display_name": null}
        ])))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let client = LookerClient::connect(fixture.config.clone()).await.unwrap();
    let users = client.search_users_by_email("ann@example.com").await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, PrincipalId::new("42"));
    assert_eq!(users[0].display_name, None);
}

#[tokio::test]
async fn test_missing_group_maps_to_not_found() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/api/4.0/groups/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "message": "Not found",
            "documentation_url": "https://cloud.google.com/looker/docs/"
        })))
        .mount(&fixture.server)
        .await;

    let err = fixture.client().get_group("99").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        ApiError::NotFound { ref resource, ref id } if resource == "group" && id == "99"
    ));
}

#[tokio::test]
async fn test_list_grants_translates_principals() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/api/4.0/content_metadata_access"))
        .and(query_param("content_metadata_id", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "501",
                "content_metadata_id": "40",
                "permission_type": "view",
                "group_id": "7",
                "user_id": null
            },
            {
                "id": "502",
                "content_metadata_id": "40",
                "permission_type": "edit",
                "group_id": null,
                "user_id": "42"
            }
        ])))
        .mount(&fixture.server)
        .await;

    let grants = fixture.client().list_grants("40").await.unwrap();

    assert_eq!(grants.len(), 2);
    assert_eq!(grants[0].principal, Principal::group("7"));
    assert_eq!(grants[0].level, PermissionLevel::View);
    assert_eq!(grants[1].principal, Principal::user("42"));
    assert_eq!(grants[1].level, PermissionLevel::Edit);
}

#[tokio::test]
async fn test_update_grant_sends_level_only() {
    let fixture = TestFixture::new().await;

    Mock::given(method("PATCH"))
        .and(path("/api/4.0/content_metadata_access/501"))
        .and(body_json(serde_json::json!({"permission_type": "edit"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "501",
            "content_metadata_id": "40",
            "permission_type": "edit",
            "group_id": "7"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let grant = fixture
        .client()
        .update_grant("501", PermissionLevel::Edit)
        .await
        .unwrap();
    assert_eq!(grant.id, "501");
    assert_eq!(grant.level, PermissionLevel::Edit);
}

#[tokio::test]
async fn test_error_body_is_passed_through() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/api/4.0/groups"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Validation Failed: name"))
        .mount(&fixture.server)
        .await;

    let err = fixture.client().create_group("dup").await.unwrap_err();
    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Validation Failed: name");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_login_is_authentication_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/4.0/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = LookerConfig::default()
        .with_base_url(server.uri())
        .with_credentials("bad", "creds");
    let result = LookerClient::connect(config).await;

    assert!(matches!(result, Err(ApiError::AuthenticationFailed)));
}

/// Login endpoint that hands out `first` once, then `second`.
async fn mount_two_logins(server: &MockServer, first: serde_json::Value, second: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/4.0/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/4.0/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(second))
        .expect(1)
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> LookerConfig {
    LookerConfig::default()
        .with_base_url(server.uri())
        .with_credentials("test-client", "test-secret")
        .with_timeout_secs(5)
}

#[tokio::test]
async fn test_rejected_token_logs_in_again_and_retries() {
    let server = MockServer::start().await;
    mount_two_logins(
        &server,
        serde_json::json!({"access_token": "tok-old", "expires_in": 3600}),
        serde_json::json!({"access_token": "tok-new", "expires_in": 3600}),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/4.0/groups/7"))
        .and(header("Authorization", "token tok-old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/4.0/groups/7"))
        .and(header("Authorization", "token tok-new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "7",
            "name": "analysts",
            "user_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LookerClient::new(config_for(&server)).unwrap();
    let group = client.get_group("7").await.unwrap();

    assert_eq!(group.name, "analysts");
    server.verify().await;
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_use() {
    let server = MockServer::start().await;
    mount_two_logins(
        &server,
        serde_json::json!({"access_token": "tok-old", "expires_in": 0}),
        serde_json::json!({"access_token": "tok-new", "expires_in": 3600}),
    )
    .await;

    for token in ["token tok-old", "token tok-new"] {
        Mock::given(method("DELETE"))
            .and(path("/api/4.0/groups/7"))
            .and(header("Authorization", token))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = LookerClient::new(config_for(&server)).unwrap();
    client.delete_group("7").await.unwrap();
    client.delete_group("7").await.unwrap();

    server.verify().await;
}
