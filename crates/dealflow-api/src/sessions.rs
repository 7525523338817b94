// Session HTTP routes
//
// CRUD over workflow sessions plus the workflow operations: ingest, advance,
// complete step, reset, edit, regenerate, push and progress.

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dealflow_core::{
    Artifact, ArtifactKind, FieldValue, GateView, InsightField, Phase, PushResult,
    WorkflowEngine, WorkflowSession,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::ListResponse;
use crate::error::ApiError;
use crate::services::SessionService;

/// Largest ingest request body; base64 inflates uploads by a third
const INGEST_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Request to create a session
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Artifact kind driving the session.
    #[serde(default = "default_kind")]
    #[schema(example = "call_transcript")]
    pub kind: String,
}

fn default_kind() -> String {
    ArtifactKind::CALL_TRANSCRIPT.to_string()
}

/// Artifact to ingest
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum IngestRequest {
    /// Uploaded file, base64 encoded
    Upload {
        #[schema(example = "discovery-call.txt")]
        filename: String,
        /// MIME type; inferred from the extension when omitted
        #[serde(default)]
        #[schema(example = "text/plain")]
        content_type: String,
        content_base64: String,
    },
    /// Recording held by an external recording service
    Recording {
        #[schema(example = "gong")]
        provider: String,
        id: String,
    },
}

/// Request to move to a step
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    #[schema(example = 2)]
    pub step: u32,
}

/// Request to replace one insight field
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EditFieldRequest {
    /// A string for text fields, an array of strings for key points, an
    /// array of `{offset, score}` points for the sentiment series.
    #[schema(example = json!("Thanks for your time today."))]
    pub value: FieldValue,
}

/// Request to push insights to the CRM
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PushRequest {
    #[schema(example = "acme-42")]
    pub prospect_id: String,
}

/// Session state with its gate evaluation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: WorkflowSession,
    pub gate: GateView,
    /// Ingest progress, while one is running for this session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl SessionResponse {
    fn from_engine(engine: &WorkflowEngine) -> Self {
        Self {
            session: engine.session(),
            gate: engine.gate(),
            progress: engine.progress(),
        }
    }
}

/// Ingest progress
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
}

/// A regenerated field
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegeneratedField {
    pub field: InsightField,
    pub value: FieldValue,
}

/// App state for session routes
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
}

impl AppState {
    pub fn new(session_service: Arc<SessionService>) -> Self {
        Self { session_service }
    }

    fn engine(&self, id: Uuid) -> Result<Arc<WorkflowEngine>, ApiError> {
        self.session_service
            .get(id)
            .ok_or_else(|| ApiError::not_found(format!("session {id} not found")))
    }
}

/// Create session routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/sessions", post(create_session).get(list_sessions))
        .route(
            "/v1/sessions/:session_id",
            get(get_session).delete(delete_session),
        )
        .route(
            "/v1/sessions/:session_id/ingest",
            post(ingest).layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT)),
        )
        .route("/v1/sessions/:session_id/progress", get(get_progress))
        .route("/v1/sessions/:session_id/advance", post(advance))
        .route(
            "/v1/sessions/:session_id/steps/:step/complete",
            post(complete_step),
        )
        .route("/v1/sessions/:session_id/reset", post(reset))
        .route("/v1/sessions/:session_id/insights/:field", put(edit_field))
        .route(
            "/v1/sessions/:session_id/insights/:field/regenerate",
            post(regenerate_field),
        )
        .route("/v1/sessions/:session_id/push", post(push))
        .with_state(state)
}

/// POST /v1/sessions - Create a new session
#[utoipa::path(
    post,
    path = "/v1/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = SessionResponse),
        (status = 400, description = "Unknown artifact kind", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    if !state.session_service.is_known_kind(&req.kind) {
        return Err(ApiError::bad_request(format!(
            "unknown artifact kind: {}",
            req.kind
        )));
    }
    let engine = state.session_service.create(&req.kind)?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from_engine(&engine))))
}

/// GET /v1/sessions - List sessions
#[utoipa::path(
    get,
    path = "/v1/sessions",
    responses(
        (status = 200, description = "List of sessions", body = ListResponse<SessionResponse>)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(State(state): State<AppState>) -> Json<ListResponse<SessionResponse>> {
    let sessions = state
        .session_service
        .list()
        .iter()
        .map(|engine| SessionResponse::from_engine(engine))
        .collect();
    Json(ListResponse::new(sessions))
}

/// GET /v1/sessions/{session_id} - Get session
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 404, description = "Session not found", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let engine = state.engine(session_id)?;
    Ok(Json(SessionResponse::from_engine(&engine)))
}

/// DELETE /v1/sessions/{session_id} - Delete session
#[utoipa::path(
    delete,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Session not found", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.session_service.delete(session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("session {session_id} not found")))
    }
}

/// POST /v1/sessions/{session_id}/ingest - Validate and ingest an artifact
///
/// Returns as soon as the artifact is accepted; poll the session or its
/// progress until the phase leaves `ingesting`.
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/ingest",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    request_body = IngestRequest,
    responses(
        (status = 202, description = "Artifact accepted, ingest running", body = SessionResponse),
        (status = 400, description = "Body is not valid base64", body = ApiError),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Session is busy or already ingested", body = ApiError),
        (status = 422, description = "Artifact failed validation", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn ingest(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let engine = state.engine(session_id)?;

    let artifact = match req {
        IngestRequest::Upload {
            filename,
            content_type,
            content_base64,
        } => {
            let bytes = BASE64
                .decode(content_base64.trim())
                .map_err(|e| ApiError::bad_request(format!("content_base64 is not valid base64: {e}")))?;
            Artifact::upload(filename, content_type, bytes)
        }
        IngestRequest::Recording { provider, id } => Artifact::recording(provider, id),
    };

    // The handle is dropped; the ingest task keeps running on its own
    let handle = engine.ingest(artifact).await?;
    tracing::debug!(%session_id, generation = handle.generation(), "Ingest accepted");

    Ok((StatusCode::ACCEPTED, Json(SessionResponse::from_engine(&engine))))
}

/// GET /v1/sessions/{session_id}/progress - Ingest progress
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}/progress",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Current progress", body = ProgressResponse),
        (status = 404, description = "Session not found", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn get_progress(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let engine = state.engine(session_id)?;
    Ok(Json(ProgressResponse {
        phase: engine.session().phase,
        percent: engine.progress(),
    }))
}

/// POST /v1/sessions/{session_id}/advance - Move to a step
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/advance",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "Step entered", body = SessionResponse),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Step is locked", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn advance(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let engine = state.engine(session_id)?;
    engine.advance(req.step).await?;
    Ok(Json(SessionResponse::from_engine(&engine)))
}

/// POST /v1/sessions/{session_id}/steps/{step}/complete - Mark a step completed
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/steps/{step}/complete",
    params(
        ("session_id" = Uuid, Path, description = "Session ID"),
        ("step" = u32, Path, description = "Step number, starting at 1")
    ),
    responses(
        (status = 200, description = "Step completed", body = SessionResponse),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Step out of range", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn complete_step(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(Uuid, u32)>,
) -> Result<Json<SessionResponse>, ApiError> {
    let engine = state.engine(session_id)?;
    engine.mark_completed(step).await?;
    Ok(Json(SessionResponse::from_engine(&engine)))
}

/// POST /v1/sessions/{session_id}/reset - Clear the session
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/reset",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session reset", body = SessionResponse),
        (status = 404, description = "Session not found", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn reset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let engine = state.engine(session_id)?;
    engine.reset().await;
    Ok(Json(SessionResponse::from_engine(&engine)))
}

/// PUT /v1/sessions/{session_id}/insights/{field} - Replace one insight field
#[utoipa::path(
    put,
    path = "/v1/sessions/{session_id}/insights/{field}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID"),
        ("field" = InsightField, Path, description = "Insight field")
    ),
    request_body = EditFieldRequest,
    responses(
        (status = 200, description = "Field updated", body = SessionResponse),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Session is not in review", body = ApiError),
        (status = 422, description = "Value does not fit the field", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn edit_field(
    State(state): State<AppState>,
    Path((session_id, field)): Path<(Uuid, InsightField)>,
    Json(req): Json<EditFieldRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let engine = state.engine(session_id)?;
    engine.edit(field, req.value).await?;
    Ok(Json(SessionResponse::from_engine(&engine)))
}

/// POST /v1/sessions/{session_id}/insights/{field}/regenerate - Regenerate one field
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/insights/{field}/regenerate",
    params(
        ("session_id" = Uuid, Path, description = "Session ID"),
        ("field" = InsightField, Path, description = "Insight field")
    ),
    responses(
        (status = 200, description = "Field regenerated", body = RegeneratedField),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Session is not in review", body = ApiError),
        (status = 502, description = "Regeneration service failed; prior value kept", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn regenerate_field(
    State(state): State<AppState>,
    Path((session_id, field)): Path<(Uuid, InsightField)>,
) -> Result<Json<RegeneratedField>, ApiError> {
    let engine = state.engine(session_id)?;
    let value = engine.regenerate(field).await?;
    Ok(Json(RegeneratedField { field, value }))
}

/// POST /v1/sessions/{session_id}/push - Push insights to the CRM
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/push",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    request_body = PushRequest,
    responses(
        (status = 200, description = "Insights pushed", body = PushResult),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Already pushed, busy, or nothing to push", body = ApiError),
        (status = 422, description = "Prospect id missing", body = ApiError),
        (status = 502, description = "CRM push failed; retry is allowed", body = ApiError)
    ),
    tag = "workflow"
)]
pub async fn push(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<PushRequest>,
) -> Result<Json<PushResult>, ApiError> {
    let engine = state.engine(session_id)?;
    let result = engine.push(&req.prospect_id).await?;
    Ok(Json(result))
}
