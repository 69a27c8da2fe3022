//! Integration tests for `HttpIdentityChecker` against a mock backend.

use medgate_protocol::{LoginRequest, Role, SourceKind};
use medgate_session::{FailureKind, HttpCheckerConfig, HttpIdentityChecker, IdentityChecker};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checker_for(server: &MockServer) -> HttpIdentityChecker {
    HttpIdentityChecker::new(HttpCheckerConfig {
        base_url: format!("{}/api/", server.uri()),
        ..HttpCheckerConfig::default()
    })
    .unwrap()
}

// ===== who_am_i =====

#[tokio::test]
async fn test_who_am_i_sends_bearer_and_parses_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer jwt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "_id": 42,
                "name": "Amaka",
                "email": "amaka@example.org",
                "role": "hospital_admin",
                "avatar": "/a.png"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = checker_for(&server).who_am_i("jwt-1").await.unwrap();

    assert_eq!(user.id, "42");
    assert_eq!(user.role, Role::HospitalAdmin);
    assert_eq!(user.avatar.as_deref(), Some("/a.png"));
}

#[tokio::test]
async fn test_who_am_i_unknown_role_is_kept_as_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": "u1", "role": "pharmacist" }
        })))
        .mount(&server)
        .await;

    let user = checker_for(&server).who_am_i("t").await.unwrap();

    assert_eq!(user.role, Role::Unknown);
}

#[tokio::test]
async fn test_who_am_i_401_and_403_are_auth_invalid() {
    for status in [401u16, 403] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(status).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = checker_for(&server).who_am_i("t").await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::AuthInvalid, "status {status}");
    }
}

#[tokio::test]
async fn test_who_am_i_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = checker_for(&server).who_am_i("t").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transient);
}

#[tokio::test]
async fn test_who_am_i_success_without_user_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let err = checker_for(&server).who_am_i("t").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::MalformedResponse);
}

#[tokio::test]
async fn test_who_am_i_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = checker_for(&server).who_am_i("t").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::MalformedResponse);
}

#[tokio::test]
async fn test_who_am_i_unreachable_backend_is_transient() {
    let server = MockServer::start().await;
    let checker = checker_for(&server);
    drop(server);

    let err = checker.who_am_i("t").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transient);
}

// ===== login =====

#[tokio::test]
async fn test_login_posts_to_source_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .and(body_json(json!({ "email": "a@b.org", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": "s1", "role": "super_admin" },
            "token": "fresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = checker_for(&server)
        .login(
            SourceKind::New,
            &LoginRequest {
                email: "a@b.org".into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.token, "fresh");
    assert_eq!(response.user.role, Role::SuperAdmin);
}

#[tokio::test]
async fn test_login_bad_credentials_is_auth_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = checker_for(&server)
        .login(
            SourceKind::Legacy,
            &LoginRequest {
                email: "a@b.org".into(),
                password: "wrong".into(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::AuthInvalid);
}
