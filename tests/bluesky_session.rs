use serde_json::json;
use skyfeed::feeds::bluesky::BskySession;
use skyfeed::feeds::TimelineSource;
use skyfeed::parser::parse_feed;
use skyfeed::Error;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .and(body_json(json!({
            "identifier": "alice.test",
            "password": "app-pass"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessJwt": "jwt-123",
            "refreshJwt": "refresh-456",
            "did": "did:plc:alice",
            "handle": "alice.test"
        })))
        .mount(server)
        .await;
}

async fn login(server: &MockServer) -> Result<BskySession, Error> {
    BskySession::login(&server.uri(), "alice.test", "app-pass", Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_login_stores_session() {
    let server = MockServer::start().await;
    mock_login(&server).await;

    let session = login(&server).await.unwrap();
    assert_eq!(session.handle(), "alice.test");
    assert_eq!(session.did(), "did:plc:alice");
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "AuthenticationRequired",
            "message": "Invalid identifier or password"
        })))
        .mount(&server)
        .await;

    let err = login(&server).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_timeline_uses_bearer_token_and_limit() {
    let server = MockServer::start().await;
    mock_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getTimeline"))
        .and(header("Authorization", "Bearer jwt-123"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cursor": "abc",
            "feed": [
                {
                    "post": {
                        "uri": "at://did:plc:bob/app.bsky.feed.post/1",
                        "cid": "bafy1",
                        "author": { "did": "did:plc:bob", "handle": "bob.test", "displayName": "Bob" },
                        "record": { "text": "BREAKING: hello", "createdAt": "2024-05-01T12:00:00.000Z" },
                        "indexedAt": "2024-05-01T12:00:00.000Z"
                    }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = login(&server).await.unwrap();
    let items = session.fetch_timeline(20).await.unwrap();
    assert_eq!(items.len(), 1);

    let posts = parse_feed(&items);
    assert_eq!(posts[0].id, "bafy1");
    assert_eq!(posts[0].handle, "@bob.test");
}

#[tokio::test]
async fn test_timeline_error_status_is_fetch_error() {
    let server = MockServer::start().await;
    mock_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getTimeline"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "ExpiredToken",
            "message": "Token has expired"
        })))
        .mount(&server)
        .await;

    let session = login(&server).await.unwrap();
    let err = session.fetch_timeline(20).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
}

#[tokio::test]
async fn test_timeline_timeout_is_fetch_error() {
    let server = MockServer::start().await;
    mock_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getTimeline"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "feed": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let session = BskySession::login(&server.uri(), "alice.test", "app-pass", Duration::from_millis(200))
        .await
        .unwrap();
    let err = session.fetch_timeline(20).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
}
