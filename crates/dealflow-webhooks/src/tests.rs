// Webhook client tests against a local mock server

use dealflow_core::memory::sample_insights;
use dealflow_core::{
    Artifact, ArtifactKind, ArtifactRef, CrmClient, CrmPushRequest, CurrentUser, FieldValue,
    InsightField, InsightService, PushTarget, RegenerateRequest, Regenerator, WorkflowConfig,
};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{WebhookConfig, WebhookCrmClient, WebhookInsightService, WebhookRegenerator};

fn config(server: &MockServer) -> WebhookConfig {
    WebhookConfig::with_base_url(&server.uri()).with_api_key("secret")
}

fn artifact_ref() -> ArtifactRef {
    ArtifactRef {
        id: Uuid::now_v7(),
        label: "call.txt".to_string(),
        content_type: Some("text/plain".to_string()),
        size_bytes: Some(5),
        sha256: None,
        accepted_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_analyze_posts_base64_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/insights"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_insights()))
        .expect(1)
        .mount(&server)
        .await;

    let service = WebhookInsightService::new(&config(&server)).unwrap();
    let kind = ArtifactKind::call_transcript(&WorkflowConfig::default());
    let artifact = Artifact::upload("call.txt", "text/plain", b"hello".to_vec());

    let bundle = service
        .analyze(&artifact, &kind, &CurrentUser::anonymous())
        .await
        .unwrap();
    assert_eq!(bundle, sample_insights());

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["kind"], "call_transcript");
    assert_eq!(body["artifact"]["source"], "upload");
    assert_eq!(body["artifact"]["content_base64"], "aGVsbG8=");
    assert_eq!(body["required_fields"], json!(["summary_text", "key_points"]));
    assert_eq!(body["user"]["email"], "anonymous@local");
}

#[tokio::test]
async fn test_analyze_sends_inferred_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/insights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_insights()))
        .mount(&server)
        .await;

    let service = WebhookInsightService::new(&config(&server)).unwrap();
    let kind = ArtifactKind::call_transcript(&WorkflowConfig::default());
    let artifact = Artifact::upload("call.vtt", "", b"WEBVTT".to_vec());

    service
        .analyze(&artifact, &kind, &CurrentUser::anonymous())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["artifact"]["content_type"], "text/vtt");
}

#[tokio::test]
async fn test_analyze_reports_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/insights"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let service = WebhookInsightService::new(&config(&server)).unwrap();
    let kind = ArtifactKind::call_recording(&WorkflowConfig::default());

    let err = service
        .analyze(
            &Artifact::recording("gong", "rec-1"),
            &kind,
            &CurrentUser::anonymous(),
        )
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("503"));
    assert!(message.contains("overloaded"));
}

#[tokio::test]
async fn test_analyze_rejects_malformed_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/insights"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let service = WebhookInsightService::new(&config(&server)).unwrap();
    let kind = ArtifactKind::call_transcript(&WorkflowConfig::default());
    let artifact = Artifact::upload("call.txt", "text/plain", b"hello".to_vec());

    let err = service
        .analyze(&artifact, &kind, &CurrentUser::anonymous())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to parse insights response"));
}

#[tokio::test]
async fn test_regenerate_returns_field_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/regenerate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": ["One", "Two"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let regenerator = WebhookRegenerator::new(&config(&server)).unwrap();
    let request = RegenerateRequest {
        session_id: Uuid::now_v7(),
        field: InsightField::KeyPoints,
        artifact: artifact_ref(),
        insights: sample_insights(),
    };

    let value = regenerator
        .regenerate(&request, &CurrentUser::anonymous())
        .await
        .unwrap();
    assert_eq!(
        value,
        FieldValue::List(vec!["One".to_string(), "Two".to_string()])
    );

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["field"], "key_points");
    assert_eq!(body["insights"]["summary_text"], sample_insights().summary_text);
}

fn push_request() -> CrmPushRequest {
    CrmPushRequest {
        session_id: Uuid::now_v7(),
        prospect_id: "acme-42".to_string(),
        target: PushTarget::DealNotes,
        artifact_label: "call.txt".to_string(),
        insights: sample_insights(),
        user_id: Uuid::nil(),
        user_email: "rep@example.com".to_string(),
    }
}

#[tokio::test]
async fn test_crm_push_reads_record_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/push"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "record_id": "deal-9" })))
        .expect(1)
        .mount(&server)
        .await;

    let crm = WebhookCrmClient::new(&config(&server)).unwrap();
    let receipt = crm.push(&push_request()).await.unwrap();

    assert_eq!(receipt.record_id.as_deref(), Some("deal-9"));
}

#[tokio::test]
async fn test_crm_push_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/push"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let crm = WebhookCrmClient::new(&config(&server)).unwrap();
    let receipt = crm.push(&push_request()).await.unwrap();

    assert!(receipt.record_id.is_none());
}

#[tokio::test]
async fn test_crm_push_failure_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/push"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let crm = WebhookCrmClient::new(&config(&server)).unwrap();
    assert!(crm.push(&push_request()).await.is_err());
}
