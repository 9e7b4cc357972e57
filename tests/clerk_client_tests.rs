use std::time::Duration;

use clerk_sync::identity::{ClerkClient, IdentityError, IdentityProvider};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn client(server: &MockServer) -> ClerkClient {
    ClerkClient::new(&server.uri(), "sk_test_123", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn get_session_sends_bearer_key_and_decodes_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/sess_123"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "session",
            "id": "sess_123",
            "user_id": "user_29w83sxmDNGwOuEthce5gg56FcC",
            "client_id": "client_1",
            "status": "active",
            "last_active_at": 1_700_000_000_000i64,
            "expire_at": 1_700_600_000_000i64,
            "abandon_at": 1_702_000_000_000i64,
            "created_at": 1_700_000_000_000i64,
            "updated_at": 1_700_000_000_000i64
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = client(&mock_server).get_session("sess_123").await.unwrap();

    assert_eq!(session.id, "sess_123");
    assert_eq!(
        session.user_id.as_deref(),
        Some("user_29w83sxmDNGwOuEthce5gg56FcC")
    );
    assert_eq!(session.status.as_deref(), Some("active"));
    assert_eq!(session.expire_at, Some(1_700_600_000_000));
}

#[tokio::test]
async fn get_session_surfaces_http_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/sess_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"code": "resource_not_found", "message": "not found"}]
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .get_session("sess_missing")
        .await
        .unwrap_err();

    match err {
        IdentityError::Http { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("resource_not_found"));
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn get_session_with_undecodable_body_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/sess_123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server).get_session("sess_123").await.unwrap_err();
    assert!(matches!(err, IdentityError::Transport(_)));
}

#[tokio::test]
async fn get_session_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/sess_slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "sess_slow"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client =
        ClerkClient::new(&mock_server.uri(), "sk_test_123", Duration::from_millis(200)).unwrap();
    let err = client.get_session("sess_slow").await.unwrap_err();

    let IdentityError::Transport(source) = err else {
        panic!("expected transport error");
    };
    assert!(source.is_timeout());
}
