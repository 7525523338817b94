// Router tests driving the full app with simulated collaborators

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dealflow_core::memory::{MockCrmClient, MockInsightService, MockRegenerator};
use dealflow_core::NoProgress;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    crm: Arc<MockCrmClient>,
}

fn test_app() -> TestApp {
    let crm = Arc::new(MockCrmClient::new());
    let collaborators = Collaborators {
        insight_service: Arc::new(MockInsightService::new()),
        regenerator: Arc::new(MockRegenerator::new()),
        crm: crm.clone(),
    };
    let service = SessionService::new(
        WorkflowConfig::default(),
        CurrentUser::new(Uuid::now_v7(), "rep@example.com", "Sales Rep"),
        collaborators,
        Arc::new(InMemoryHistoryStore::new()),
        Arc::new(TracingEventEmitter),
    )
    .with_progress(Arc::new(NoProgress));

    TestApp {
        router: build_app(AppState::new(Arc::new(service)), ""),
        crm,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_session(router: &Router) -> String {
    let (status, body) = send(router, "POST", "/v1/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["phase"], "idle");
    body["id"].as_str().unwrap().to_string()
}

fn upload(filename: &str, content: &[u8]) -> Value {
    use base64::Engine;
    json!({
        "source": "upload",
        "filename": filename,
        "content_type": "text/plain",
        "content_base64": base64::engine::general_purpose::STANDARD.encode(content),
    })
}

async fn wait_for_phase(router: &Router, id: &str, phase: &str) -> Value {
    for _ in 0..100 {
        let (_, body) = send(router, "GET", &format!("/v1/sessions/{id}"), None).await;
        if body["phase"] == phase {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {id} never reached phase {phase}");
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_full_workflow_over_http() {
    let app = test_app();
    let id = create_session(&app.router).await;

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/ingest"),
        Some(upload("call.txt", b"Rep: hello\nProspect: hi")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["artifact"]["label"], "call.txt");

    let session = wait_for_phase(&app.router, &id, "reviewing").await;
    assert_eq!(session["completed_steps"], json!([1]));
    assert_eq!(session["gate"]["actions"]["push"], true);

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/advance"),
        Some(json!({ "step": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        "PUT",
        &format!("/v1/sessions/{id}/insights/key_points"),
        Some(json!({ "value": ["Budget confirmed"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["insights"]["key_points"], json!(["Budget confirmed"]));

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/insights/summary_text/regenerate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["field"], "summary_text");

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/push"),
        Some(json!({ "prospect_id": "acme-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/push"),
        Some(json!({ "prospect_id": "acme-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_pushed");
    assert_eq!(app.crm.requests().await.len(), 1);

    let (status, body) = send(&app.router, "GET", "/v1/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["prospect_id"], "acme-42");
}

#[tokio::test]
async fn test_oversized_upload_is_unprocessable() {
    let app = test_app();
    let id = create_session(&app.router).await;
    let content = vec![b'a'; 15 * 1024 * 1024];

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/ingest"),
        Some(upload("long.txt", &content)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("size"));

    let (_, session) = send(&app.router, "GET", &format!("/v1/sessions/{id}"), None).await;
    assert_eq!(session["phase"], "idle");
}

#[tokio::test]
async fn test_invalid_base64_is_bad_request() {
    let app = test_app();
    let id = create_session(&app.router).await;

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/ingest"),
        Some(json!({
            "source": "upload",
            "filename": "call.txt",
            "content_base64": "***",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_locked_step_is_conflict() {
    let app = test_app();
    let id = create_session(&app.router).await;

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/advance"),
        Some(json!({ "step": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn test_push_failure_is_bad_gateway_and_retryable() {
    let app = test_app();
    let id = create_session(&app.router).await;
    send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/ingest"),
        Some(upload("call.txt", b"hello")),
    )
    .await;
    wait_for_phase(&app.router, &id, "reviewing").await;

    app.crm.add_failure("CRM unavailable").await;
    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/push"),
        Some(json!({ "prospect_id": "acme-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "push_failure");

    let session = wait_for_phase(&app.router, &id, "reviewing").await;
    assert_eq!(session["completed_steps"], json!([1]));

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/push"),
        Some(json!({ "prospect_id": "acme-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_clears_session() {
    let app = test_app();
    let id = create_session(&app.router).await;
    send(
        &app.router,
        "POST",
        &format!("/v1/sessions/{id}/ingest"),
        Some(json!({ "source": "upload", "filename": "call.vtt", "content_base64": "V0VCVlRU" })),
    )
    .await;
    wait_for_phase(&app.router, &id, "reviewing").await;

    let (status, body) = send(&app.router, "POST", &format!("/v1/sessions/{id}/reset"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["current_step"], 1);
    assert_eq!(body["completed_steps"], json!([]));
    assert!(body.get("insights").is_none());
}

#[tokio::test]
async fn test_unknown_session_and_kind() {
    let app = test_app();

    let (status, body) = send(
        &app.router,
        "GET",
        &format!("/v1/sessions/{}", Uuid::now_v7()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/sessions",
        Some(json!({ "kind": "video_call" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_session() {
    let app = test_app();
    let id = create_session(&app.router).await;

    let (status, _) = send(&app.router, "DELETE", &format!("/v1/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app.router, "GET", &format!("/v1/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_update() {
    let app = test_app();

    let (status, body) = send(
        &app.router,
        "PATCH",
        "/v1/me",
        Some(json!({ "company": "Acme Sales", "email_signature": "Best, Sam" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["company"], "Acme Sales");
    assert_eq!(body["name"], "Sales Rep");

    let (_, body) = send(&app.router, "GET", "/v1/me", None).await;
    assert_eq!(body["email_signature"], "Best, Sam");
}

#[tokio::test]
async fn test_api_prefix_set() {
    let app = build_router_with_prefix(Router::new().route("/v1/test", get(|| async { "ok" })), "/api");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/test").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = app
        .oneshot(Request::builder().uri("/v1/test").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
