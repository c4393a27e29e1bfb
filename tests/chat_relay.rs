//! Agent round-trip tests against a mocked agent service.
//!
//! Asserts: thread creation, message → run → poll → reply sequencing, run
//! failure surfacing, and API-version/auth wiring.

use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blobdex::agent::AgentClient;
use blobdex::config::ChatSettings;

fn settings(server: &MockServer) -> ChatSettings {
    ChatSettings {
        endpoint: server.uri(),
        agent_id: "agent_x".to_string(),
        token: "test-token".to_string(),
        api_version: "v1".to_string(),
        poll_interval_secs: 0,
        max_polls: 5,
    }
}

#[tokio::test]
async fn full_round_trip_returns_latest_assistant_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/threads"))
        .and(query_param("api-version", "v1"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "thread_abc" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/messages"))
        .and(body_partial_json(
            serde_json::json!({ "role": "user", "content": "are the signatures valid?" }),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg_1" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/runs"))
        .and(body_partial_json(serde_json::json!({ "assistant_id": "agent_x" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "run_1", "status": "queued" })),
        )
        .mount(&server)
        .await;

    // First poll still running, second poll finished.
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "run_1", "status": "in_progress" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "run_1", "status": "completed" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/messages"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {
                    "id": "msg_2",
                    "role": "assistant",
                    "content": [
                        { "type": "text", "text": { "value": "All signatures are valid." } }
                    ]
                },
                {
                    "id": "msg_1",
                    "role": "user",
                    "content": [
                        { "type": "text", "text": { "value": "are the signatures valid?" } }
                    ]
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = AgentClient::new(&settings(&server)).unwrap();
    let thread_id = client.create_thread().await.unwrap();
    assert_eq!(thread_id, "thread_abc");

    let reply = client
        .ask(&thread_id, "are the signatures valid?")
        .await
        .unwrap();
    assert_eq!(reply, "All signatures are valid.");
}

#[tokio::test]
async fn failed_run_surfaces_error_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/threads/thread_f/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg_1" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/threads/thread_f/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "run_9", "status": "queued" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/threads/thread_f/runs/run_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "run_9",
            "status": "failed",
            "last_error": { "code": "rate_limit_exceeded", "message": "try again later" }
        })))
        .mount(&server)
        .await;

    let client = AgentClient::new(&settings(&server)).unwrap();
    let err = client.ask("thread_f", "hello").await.unwrap_err();
    let text = format!("{:#}", err);
    assert!(text.contains("failed"), "unexpected error: {}", text);
    assert!(text.contains("rate_limit_exceeded"), "unexpected error: {}", text);
}

#[tokio::test]
async fn run_that_never_finishes_exhausts_poll_budget() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/threads/thread_s/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg_1" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/threads/thread_s/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "run_s", "status": "queued" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/threads/thread_s/runs/run_s"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "run_s", "status": "in_progress" })),
        )
        .mount(&server)
        .await;

    let client = AgentClient::new(&settings(&server)).unwrap();
    let err = client.ask("thread_s", "hello").await.unwrap_err();
    assert!(format!("{:#}", err).contains("did not finish"));
}
