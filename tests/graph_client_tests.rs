//! Integration tests for Graph client retry and pagination behavior
//!
//! Uses wiremock to simulate Graph API responses and verifies retry
//! behavior, rate limit handling, pagination, and error propagation
//! through the real GraphClient.

use cat365::error::Cat365Error;
use cat365::graph::GraphClient;
use serde::Deserialize;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestUser {
    id: String,
    display_name: String,
}

fn client_for(server: &MockServer) -> GraphClient {
    GraphClient::with_base_url("test-token".to_string(), server.uri())
}

#[tokio::test]
async fn test_get_deserializes_typed_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "12345",
            "displayName": "Test User"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: TestUser = client_for(&server).get("me").await.unwrap();
    assert_eq!(user.id, "12345");
    assert_eq!(user.display_name, "Test User");
}

#[tokio::test]
async fn test_not_found_fails_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nonexistent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource not found."
            }
        })))
        .expect(1) // no retry on 4xx
        .mount(&server)
        .await;

    let result: Result<TestUser, _> = client_for(&server).get("nonexistent").await;
    match result {
        Err(Cat365Error::GraphApiError(msg)) => {
            assert!(msg.contains("404"));
            assert!(msg.contains("Request_ResourceNotFound"));
        }
        other => panic!("expected GraphApiError, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_rate_limit_retries_after_header() {
    let server = MockServer::start().await;

    // First call is throttled; the retry succeeds
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(
            ResponseTemplate::new(429)
                .append_header("Retry-After", "1")
                .set_body_string("Rate limited"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1",
            "displayName": "After Retry"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: TestUser = client_for(&server).get("throttled").await.unwrap();
    assert_eq!(user.display_name, "After Retry");
}

#[tokio::test]
async fn test_server_error_retries_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1",
            "displayName": "Recovered"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: TestUser = client_for(&server).get("flaky").await.unwrap();
    assert_eq!(user.display_name, "Recovered");
}

#[tokio::test]
async fn test_bad_request_fails_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "code": "BadRequest",
                "message": "Property displayName is required."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result: Result<serde_json::Value, _> = client_for(&server)
        .post("things", &serde_json::json!({}))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_pagination_follows_next_link_to_exhaustion() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {"id": "1", "displayName": "One"},
                {"id": "2", "displayName": "Two"}
            ],
            "@odata.nextLink": format!("{}/items-page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/items-page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {"id": "3", "displayName": "Three"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items: Vec<TestUser> = client_for(&server).get_all_pages("items").await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].id, "3");
}

#[tokio::test]
async fn test_pagination_failure_fails_whole_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "1", "displayName": "One"}],
            "@odata.nextLink": format!("{}/items-page2", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/items-page2"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": "Forbidden", "message": "Insufficient privileges"}
        })))
        .mount(&server)
        .await;

    let result: Result<Vec<TestUser>, _> = client_for(&server).get_all_pages("items").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_put_sends_ref_body_and_accepts_no_content() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "@odata.id": "https://graph.microsoft.com/v1.0/deviceManagement/deviceCategories/cat-1"
    });

    Mock::given(method("PUT"))
        .and(path("/deviceManagement/managedDevices/d-1/deviceCategory/$ref"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .put("deviceManagement/managedDevices/d-1/deviceCategory/$ref", &body)
        .await
        .unwrap();
}
