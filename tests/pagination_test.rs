use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};
use spotify_backup::spotify::{
    ApiError, FetchError, NoProgress, ProgressSink, RetryPolicy, SpotifyClient,
};
use spotify_backup::types::Credential;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(usize, Option<u64>)>>,
}

impl ProgressSink for RecordingSink {
    fn page_loaded(&self, loaded: usize, total: Option<u64>) {
        self.reports.lock().unwrap().push((loaded, total));
    }
}

fn client(server: &MockServer) -> SpotifyClient {
    SpotifyClient::new(Credential::new("TOKEN"), &format!("{}/v1", server.uri()))
        .unwrap()
        .with_retry_policy(RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(10),
        })
}

fn items(range: std::ops::Range<u32>) -> Vec<Value> {
    range.map(|i| json!({ "id": format!("t{}", i) })).collect()
}

fn page(items: Vec<Value>, next: Option<String>, total: u64) -> Value {
    json!({ "items": items, "next": next, "total": total })
}

#[tokio::test]
async fn test_traversal_follows_next_until_exhausted() {
    let server = MockServer::start().await;
    let second = format!("{}/v1/users/U/tracks?offset=50&limit=50", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/users/U/tracks"))
        .and(query_param_is_missing("offset"))
        .and(header("authorization", "Bearer TOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items(0..50), Some(second), 80)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users/U/tracks"))
        .and(query_param("offset", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items(50..80), None, 80)))
        .expect(1)
        .mount(&server)
        .await;

    let sink = RecordingSink::default();
    let records = client(&server)
        .fetch_all("users/U/tracks", &[("limit", "50")], &sink)
        .await
        .unwrap();

    assert_eq!(records.len(), 80);
    assert_eq!(records[0]["id"], "t0");
    assert_eq!(records[49]["id"], "t49");
    assert_eq!(records[50]["id"], "t50");
    assert_eq!(records[79]["id"], "t79");
    assert_eq!(*sink.reports.lock().unwrap(), vec![(80, Some(80))]);
}

#[tokio::test]
async fn test_single_page_without_next_is_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items(0..3), None, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch_all("me/albums", &[], &NoProgress)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_empty_collection_yields_no_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/shows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(Vec::new(), None, 0)))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch_all("me/shows", &[("limit", "50")], &NoProgress)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_nested_envelope_is_followed() {
    let server = MockServer::start().await;
    let second = format!(
        "{}/v1/me/following?type=artist&after=a1&limit=1",
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/v1/me/following"))
        .and(query_param("type", "artist"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": [{"id": "a1"}], "next": second, "total": 2 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/following"))
        .and(query_param("after", "a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artists": { "items": [{"id": "a2"}], "next": null, "total": 2 }
        })))
        .mount(&server)
        .await;

    let artists = client(&server)
        .fetch_all_nested(
            "me/following",
            &[("type", "artist"), ("limit", "1")],
            "artists",
            &NoProgress,
        )
        .await
        .unwrap();

    let ids: Vec<&str> = artists.iter().filter_map(|a| a["id"].as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/episodes"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/episodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items(0..2), None, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server)
        .fetch_all("me/episodes", &[], &NoProgress)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "U", "display_name": null})),
        )
        .mount(&server)
        .await;

    // a backoff this long would time the test out if Retry-After were ignored
    let client = SpotifyClient::new(Credential::new("TOKEN"), &format!("{}/v1", server.uri()))
        .unwrap()
        .with_retry_policy(RetryPolicy {
            attempts: 2,
            backoff: Duration::from_secs(60),
        });

    let me = tokio::time::timeout(Duration::from_secs(10), client.current_user())
        .await
        .expect("Retry-After was not honoured")
        .unwrap();
    assert_eq!(me.id, "U");
    assert_eq!(me.name(), "U");
}

#[tokio::test]
async fn test_persistent_failure_exhausts_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/tracks"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_all("me/tracks", &[("limit", "50")], &NoProgress)
        .await
        .unwrap_err();

    match err {
        ApiError::FetchExhausted {
            url,
            attempts,
            last: FetchError::Status { status, body },
        } => {
            assert!(url.ends_with("/v1/me/tracks?limit=50"));
            assert_eq!(attempts, 3);
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_failure_on_later_page_discards_partial_results() {
    let server = MockServer::start().await;
    let second = format!("{}/v1/me/albums?offset=1", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/me/albums"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items(0..1), Some(second), 2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/albums"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_all("me/albums", &[], &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::FetchExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_malformed_page_is_an_unexpected_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"next": null})))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_all("me/tracks", &[], &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn test_invalid_json_is_retried_then_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).current_user().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::FetchExhausted {
            last: FetchError::Decode(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_next_cursor_outside_api_base_is_not_followed() {
    let server = MockServer::start().await;
    let foreign = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            items(0..1),
            Some(format!("{}/v1/me/tracks?offset=1", foreign.uri())),
            2,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(items(1..2), None, 2)))
        .expect(0)
        .mount(&foreign)
        .await;

    let err = client(&server)
        .fetch_all("me/tracks", &[], &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidUrl { .. }));
}
