// Dealflow API server
// Decision: Single-user deployment; the current user comes from DEALFLOW_USER_* env vars
// Decision: Fall back to simulated collaborators when no webhooks are configured

mod common;
mod error;
mod services;
mod sessions;
mod users;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use dealflow_core::memory::InMemoryHistoryStore;
use dealflow_core::{
    CurrentUser, EnabledActions, FieldValue, GateView, InsightField, InsightsBundle, Phase,
    ProfileUpdate, PushResult, SentimentPoint, SessionRecord, TracingEventEmitter,
    WorkflowConfig, WorkflowSession,
};
use dealflow_core::{ArtifactRef, PushTarget};
use dealflow_webhooks::WebhookConfig;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::common::ListResponse;
use crate::error::ApiError;
use crate::services::{Collaborators, SessionService};
use crate::sessions::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        sessions::create_session,
        sessions::list_sessions,
        sessions::get_session,
        sessions::delete_session,
        sessions::ingest,
        sessions::get_progress,
        sessions::advance,
        sessions::complete_step,
        sessions::reset,
        sessions::edit_field,
        sessions::regenerate_field,
        sessions::push,
        users::get_me,
        users::update_me,
        users::list_history,
    ),
    components(
        schemas(
            WorkflowSession, Phase, GateView, EnabledActions,
            ArtifactRef, PushTarget, PushResult,
            InsightsBundle, InsightField, FieldValue, SentimentPoint,
            CurrentUser, ProfileUpdate, SessionRecord,
            sessions::CreateSessionRequest,
            sessions::IngestRequest,
            sessions::AdvanceRequest,
            sessions::EditFieldRequest,
            sessions::PushRequest,
            sessions::SessionResponse,
            sessions::ProgressResponse,
            sessions::RegeneratedField,
            ListResponse<sessions::SessionResponse>,
            ListResponse<SessionRecord>,
            ApiError,
        )
    ),
    tags(
        (name = "sessions", description = "Workflow session management endpoints"),
        (name = "workflow", description = "Ingest, review and push operations"),
        (name = "users", description = "Current user and session history endpoints")
    ),
    info(
        title = "Dealflow API",
        version = "0.1.0",
        description = "API for turning sales-call artifacts into reviewed CRM insights",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dealflow_api=debug,dealflow_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("dealflow-api starting...");

    let config = WorkflowConfig::from_env();
    tracing::info!(
        max_artifact_bytes = config.max_artifact_bytes,
        ingest_timeout_secs = config.ingest_timeout.as_secs(),
        push_timeout_secs = config.push_timeout.as_secs(),
        "Workflow configured"
    );

    // Webhooks are optional; without them sessions run against simulated services
    let collaborators = match WebhookConfig::from_env() {
        Ok(webhooks) => {
            tracing::info!(
                insights_url = %webhooks.insights_url,
                crm_url = %webhooks.crm_url,
                "Using webhook collaborators"
            );
            Collaborators::webhooks(&webhooks).context("Failed to create webhook clients")?
        }
        Err(e) => {
            tracing::warn!(
                "Webhooks not configured ({:#}). Using simulated insight and CRM services.",
                e
            );
            Collaborators::simulated()
        }
    };

    let user = current_user_from_env();
    tracing::info!(user_id = %user.id, email = %user.email, "Current user configured");

    let session_service = SessionService::new(
        config,
        user,
        collaborators,
        Arc::new(InMemoryHistoryStore::new()),
        Arc::new(TracingEventEmitter),
    );
    let state = AppState::new(Arc::new(session_service));

    // Load API prefix from environment (default: empty)
    // Example: API_PREFIX="/api" results in routes like /api/v1/sessions
    let api_prefix = std::env::var("API_PREFIX").unwrap_or_default();
    if !api_prefix.is_empty() {
        tracing::info!(prefix = %api_prefix, "API prefix configured");
    }

    // Load CORS allowed origins from environment (optional)
    // Example: CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    let app = build_app(state, &api_prefix);

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
                .allow_credentials(true),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Identity from DEALFLOW_USER_ID / _EMAIL / _NAME, anonymous when unset
fn current_user_from_env() -> CurrentUser {
    let anonymous = CurrentUser::anonymous();
    let id = match std::env::var("DEALFLOW_USER_ID") {
        Ok(raw) => raw.trim().parse::<Uuid>().unwrap_or_else(|e| {
            tracing::warn!(value = %raw, "Invalid DEALFLOW_USER_ID ({}), using nil id", e);
            Uuid::nil()
        }),
        Err(_) => anonymous.id,
    };
    let email = std::env::var("DEALFLOW_USER_EMAIL").unwrap_or(anonymous.email);
    let name = std::env::var("DEALFLOW_USER_NAME").unwrap_or(anonymous.name);
    CurrentUser::new(id, email, name)
}

/// Health, prefixed API routes and Swagger UI (extracted for testing)
fn build_app(state: AppState, api_prefix: &str) -> Router {
    let api_routes = Router::new()
        .merge(sessions::routes(state.clone()))
        .merge(users::routes(state));

    Router::new()
        .route("/health", get(health))
        .merge(build_router_with_prefix(api_routes, api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
