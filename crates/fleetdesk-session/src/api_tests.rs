use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> HttpAuthApi {
    let api = ApiConfig {
        base_url: format!("{}/api/", server.uri()),
        ..Default::default()
    };
    let request = RequestConfig {
        timeout_ms: 200,
        ..Default::default()
    };
    HttpAuthApi::new(&api, &request)
}

#[test]
fn test_failure_message_fallbacks() {
    assert_eq!(failure_message(r#"{"message":"locked"}"#, "x"), "locked");
    assert_eq!(failure_message(r#"{"error":"expired"}"#, "x"), "expired");
    assert_eq!(failure_message("Bad Gateway", "x"), "Bad Gateway");
    assert_eq!(failure_message("", "fallback"), "fallback");
}

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"identifier": "a@b.com", "secret": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "tok-1",
            "user": {"id": 7, "email": "a@b.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = api_for(&server).login("a@b.com", "pw").await.unwrap();
    assert_eq!(grant.token, "tok-1");
    assert_eq!(grant.user.id, "7");
}

#[tokio::test]
async fn test_login_success_false_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Wrong email or password"
        })))
        .mount(&server)
        .await;

    let err = api_for(&server).login("a@b.com", "pw1").await.unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials("Wrong email or password".to_string()));
}

#[tokio::test]
async fn test_login_401() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = api_for(&server).login("a@b.com", "pw1").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
}

#[tokio::test]
async fn test_login_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).login("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::Protocol(_)));
}

#[tokio::test]
async fn test_login_missing_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": {"id": "u-1"}
        })))
        .mount(&server)
        .await;

    let err = api_for(&server).login("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::Protocol(msg) if msg.contains("token")));
}

#[tokio::test]
async fn test_login_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api_for(&server).login("a@b.com", "pw").await.unwrap_err();
    assert_eq!(
        err,
        AuthError::Server {
            status: 503,
            message: "maintenance".to_string()
        }
    );
}

#[tokio::test]
async fn test_login_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = api_for(&server).login("a@b.com", "pw").await.unwrap_err();
    assert_eq!(err, AuthError::Timeout(200));
}

#[tokio::test]
async fn test_verify_sends_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": {"id": "u-1", "name": "Dana"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = api_for(&server).verify("tok-1").await.unwrap();
    assert_eq!(user.name.as_deref(), Some("Dana"));
}

#[tokio::test]
async fn test_verify_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/verify"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "expired"})))
        .mount(&server)
        .await;

    let err = api_for(&server).verify("tok-1").await.unwrap_err();
    assert_eq!(err, AuthError::SessionExpired("expired".to_string()));
}

#[tokio::test]
async fn test_logout_posts_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    api_for(&server).logout("tok-1").await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let api = HttpAuthApi::new(
        &ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        },
        &RequestConfig::default(),
    );
    let err = api.login("a@b.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::Network(_) | AuthError::Timeout(_)));
}
