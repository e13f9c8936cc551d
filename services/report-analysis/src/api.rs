//! HTTP surface of the analysis service.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use healthmate_database::ReportStore;
use healthmate_models::{ChatRequest, ReportFilter};
use healthmate_utils::{ErrorResponse, HealthMateError};

use crate::chat::ChatAssistant;
use crate::insights::InsightsAggregator;
use crate::metrics::AnalysisMetrics;
use crate::service::AnalysisService;

/// Header set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub analysis: Arc<AnalysisService>,
    pub insights: Arc<InsightsAggregator>,
    pub chat: Arc<ChatAssistant>,
    pub store: Arc<dyn ReportStore>,
    pub metrics: AnalysisMetrics,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze/report/:report_id", post(analyze_report))
        .route("/analyze/insights", get(get_insights))
        .route("/analyze/chat", post(chat))
        .route("/reports", get(list_reports))
}

/// Request-level error rendered as `ErrorResponse`.
pub struct ApiError(pub HealthMateError);

impl<E: Into<HealthMateError>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope { success: true, data }))
}

/// Caller identity taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| HealthMateError::authentication("Missing user identity"))?;

        Uuid::parse_str(header.trim())
            .map(AuthenticatedUser)
            .map_err(|_| ApiError(HealthMateError::authentication("Invalid user identity")))
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "healthmate-report-analysis",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state
        .metrics
        .encode()
        .unwrap_or_else(|_| "Error encoding metrics".to_string())
}

/// The attempt runs in its own task so a dropped connection cannot cancel it
/// between lease acquisition and commit.
async fn analyze_report(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(report_id): Path<Uuid>,
) -> ApiResult<crate::service::AnalysisResult> {
    let analysis = Arc::clone(&state.analysis);
    let result = tokio::spawn(async move { analysis.analyze_report(report_id, user_id).await })
        .await
        .map_err(|e| HealthMateError::internal(format!("analysis task aborted: {}", e)))??;

    ok(result)
}

async fn get_insights(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<healthmate_models::HealthInsights> {
    ok(state.insights.get_insights(user_id).await?)
}

async fn chat(
    State(state): State<AppState>,
    AuthenticatedUser(_user_id): AuthenticatedUser,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<healthmate_models::ChatReply> {
    let Json(request) = payload.map_err(|e| HealthMateError::validation("body", e.body_text()))?;
    ok(state.chat.reply(request).await?)
}

async fn list_reports(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    query: Result<Query<ReportFilter>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(filter) = query.map_err(|e| HealthMateError::validation("query", e.body_text()))?;
    filter.validate()?;

    let page = state
        .store
        .list_for_owner(user_id, &filter)
        .await
        .map_err(|e| HealthMateError::persistence(format!("{:#}", e)))?;

    Ok(Json(json!({
        "success": true,
        "data": page.data,
        "pagination": page.pagination,
    })))
}
