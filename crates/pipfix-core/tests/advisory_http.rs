//! Advisory client behavior against a mock HTTP server.

use std::time::Duration;

use pipfix_core::{AdvisoryClient, AdvisoryConfig, AdvisoryError, ErrorContext, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(url: &str, max_retries: u32) -> AdvisoryConfig {
    AdvisoryConfig {
        server_url: url.to_string(),
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(10),
        },
    }
}

fn ctx() -> ErrorContext {
    ErrorContext::new(
        "pip install nonexistent-pkg",
        1,
        "",
        "ERROR: No matching distribution found for nonexistent-pkg",
    )
}

#[tokio::test]
async fn test_suggestion_returned_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze_error"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "suggestion": "Try:\n```\npip install requests\n```"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AdvisoryClient::new(config(&server.uri(), 2)).unwrap();
    let suggestion = client.request_suggestion(&ctx()).await.unwrap();
    assert!(suggestion.unwrap().contains("pip install requests"));
}

#[tokio::test]
async fn test_endpoint_segment_appended_to_bare_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze_error"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "suggestion": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    // server.uri() has no path; the client must add /analyze_error itself.
    let client = AdvisoryClient::new(config(&server.uri(), 0)).unwrap();
    client.request_suggestion(&ctx()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert!(body["machine_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(body["error_context"]
        .as_str()
        .is_some_and(|c| c.contains("No matching distribution")));
}

#[tokio::test]
async fn test_uncertain_marker_means_no_suggestion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "suggestion": "UNCERTAIN: the log does not indicate a pip problem"
        })))
        .mount(&server)
        .await;

    let client = AdvisoryClient::new(config(&server.uri(), 0)).unwrap();
    assert_eq!(client.request_suggestion(&ctx()).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_or_null_suggestion_means_none() {
    for body in [json!({}), json!({ "suggestion": null }), json!({ "suggestion": "" })] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = AdvisoryClient::new(config(&server.uri(), 0)).unwrap();
        assert_eq!(client.request_suggestion(&ctx()).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_malformed_json_is_parse_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .expect(1)
        .mount(&server)
        .await;

    let client = AdvisoryClient::new(config(&server.uri(), 2)).unwrap();
    match client.request_suggestion(&ctx()).await {
        Err(AdvisoryError::ResponseParse { .. }) => {}
        other => panic!("expected ResponseParse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_200_retries_exactly_budget_then_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3) // max_retries = 2 means three total attempts
        .mount(&server)
        .await;

    let client = AdvisoryClient::new(config(&server.uri(), 2)).unwrap();
    match client.request_suggestion(&ctx()).await {
        Err(AdvisoryError::ServiceUnavailable { url }) => {
            assert!(url.contains("analyze_error"));
        }
        other => panic!("expected ServiceUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_failure_exhausts_to_unavailable() {
    // Bind a server to learn a free port, then shut it down so the
    // client sees connection refused.
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = AdvisoryClient::new(config(&uri, 1)).unwrap();
    match client.request_suggestion(&ctx()).await {
        Err(AdvisoryError::ServiceUnavailable { .. }) => {}
        other => panic!("expected ServiceUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_recovers_on_retry_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "suggestion": "fixed" })))
        .mount(&server)
        .await;

    let client = AdvisoryClient::new(config(&server.uri(), 2)).unwrap();
    let suggestion = client.request_suggestion(&ctx()).await.unwrap();
    assert_eq!(suggestion.as_deref(), Some("fixed"));
}
