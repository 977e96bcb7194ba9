use std::time::Duration;

use serde_json::json;
use spotify_backup::config::Config;
use spotify_backup::spotify::{ApiError, auth};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("client:secret")
const BASIC_CLIENT_SECRET: &str = "Basic Y2xpZW50OnNlY3JldA==";

fn token_url(server: &MockServer) -> String {
    format!("{}/api/token", server.uri())
}

#[tokio::test]
async fn test_refresh_token_exchange_returns_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header("authorization", BASIC_CLIENT_SECRET))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "X",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = auth::from_refresh_token(&token_url(&server), "client", "secret", "R")
        .await
        .unwrap();
    assert_eq!(credential.token(), "X");
}

#[tokio::test]
async fn test_response_without_access_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&server)
        .await;

    let err = auth::from_refresh_token(&token_url(&server), "client", "secret", "R")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::CredentialExchangeFailed(_)));
    assert!(err.to_string().contains("access_token"));
}

#[tokio::test]
async fn test_rejected_refresh_token_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = auth::from_refresh_token(&token_url(&server), "client", "secret", "stale")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::CredentialExchangeFailed(_)));
    assert!(err.to_string().contains("Invalid refresh token"));
}

#[tokio::test]
async fn test_obtain_credential_prefers_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::new("client");
    config.client_secret = Some("secret".to_string());
    config.refresh_token = Some("R".to_string());
    config.token_url = token_url(&server);
    // would fail fast if the interactive flow were chosen
    config.auth_timeout = Duration::from_millis(1);

    let credential = auth::obtain_credential(&config).await.unwrap();
    assert_eq!(credential.token(), "fresh");
}

#[tokio::test]
async fn test_refresh_token_without_secret_is_rejected() {
    let mut config = Config::new("client");
    config.refresh_token = Some("R".to_string());

    let err = auth::obtain_credential(&config).await.unwrap_err();
    assert!(matches!(err, ApiError::CredentialExchangeFailed(_)));
}

#[tokio::test]
async fn test_authorization_code_exchange_returns_token_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=C0DE"))
        .and(body_string_contains("code_verifier=VERIFIER"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A",
            "refresh_token": "R",
            "scope": "user-library-read",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = auth::exchange_code(
        &token_url(&server),
        "client",
        "secret",
        "C0DE",
        "VERIFIER",
        &auth::code_redirect_uri(),
    )
    .await
    .unwrap();

    assert_eq!(token.access_token, "A");
    assert_eq!(token.refresh_token, "R");
    assert_eq!(token.scope, "user-library-read");
    assert_eq!(token.expires_in, 3600);
    assert!(token.obtained_at > 0);
}

#[tokio::test]
async fn test_authorization_code_exchange_requires_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "A"})))
        .mount(&server)
        .await;

    let err = auth::exchange_code(
        &token_url(&server),
        "client",
        "secret",
        "C0DE",
        "VERIFIER",
        &auth::code_redirect_uri(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("refresh_token"));
}
