//! HTTP API layer for the pipeline gateway.
//!
//! Thin handlers over the ingress facade and the pipeline observer.
//! Pipeline errors map onto status codes here and nowhere else.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use conveyor::errors::ConveyorError;
use conveyor::ingress::Ingress;
use conveyor::records::{ExecutionRecord, JobRecord};
use conveyor::runtime::PipelineObserver;
use conveyor::utils::rfc3339_timestamp;
use serde::Deserialize;
use serde_json::{json, Value};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ConveyorError> for ApiError {
    fn from(err: ConveyorError) -> Self {
        match err {
            ConveyorError::InvalidRequest(_)
            | ConveyorError::IdentityMismatch(_)
            | ConveyorError::Decode(_) => ApiError::BadRequest(err.to_string()),
            ConveyorError::ExecutionNotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ingress: Ingress,
    pub observer: PipelineObserver,
}

/// Create the gateway router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/executions/start", post(start_execution))
        .route("/executions/stop", post(stop_execution))
        .route("/executions", get(list_executions))
        .route("/stats", get(stats))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExecutionRequest {
    pub execution_name: String,
    #[serde(default)]
    pub retake: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopExecutionRequest {
    pub execution_name: String,
    pub execution_uuid: String,
}

/// POST /jobs
/// Submit one job into the pipeline
async fn submit_job(
    State(state): State<AppState>,
    Json(job): Json<JobRecord>,
) -> ApiResult<Json<JobRecord>> {
    tracing::info!(job_name = %job.job_name, "submitting job");
    let job = state.ingress.submit_job(job).await?;
    Ok(Json(job))
}

/// GET /jobs
/// List every stored job record
async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<JobRecord>>> {
    let jobs = state.ingress.list_jobs().await?;
    Ok(Json(jobs))
}

/// POST /executions/start
/// Start (or restart) an execution under a logical name
async fn start_execution(
    State(state): State<AppState>,
    Json(body): Json<StartExecutionRequest>,
) -> ApiResult<Json<Value>> {
    tracing::info!(execution_name = %body.execution_name, "starting execution");
    let request = state
        .ingress
        .start_execution(&body.execution_name, body.retake)
        .await?;
    Ok(Json(json!({
        "message": "Execution started successfully",
        "executionName": request.execution_name,
        "executionUuid": request.execution_uuid,
        "status": request.status,
    })))
}

/// POST /executions/stop
/// Stop an execution, guarded by its correlation UUID
async fn stop_execution(
    State(state): State<AppState>,
    Json(body): Json<StopExecutionRequest>,
) -> ApiResult<Json<Value>> {
    tracing::info!(execution_name = %body.execution_name, "stopping execution");
    let record = state
        .ingress
        .stop_execution(&body.execution_name, &body.execution_uuid)
        .await?;
    Ok(Json(json!({
        "message": "Execution stopped successfully",
        "executionName": record.original_name,
        "executionUuid": record.execution_uuid,
        "status": record.status,
    })))
}

/// GET /executions
/// List every versioned execution record
async fn list_executions(State(state): State<AppState>) -> ApiResult<Json<Vec<ExecutionRecord>>> {
    let executions = state.ingress.list_executions().await?;
    Ok(Json(executions))
}

/// GET /stats
/// Stage counters, queue depths, and recent records
async fn stats(State(state): State<AppState>) -> Json<Value> {
    Json(state.observer.snapshot().await)
}

/// GET /health
/// Service liveness plus a job count
async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let jobs = state.ingress.list_jobs().await?;
    Ok(Json(json!({
        "service": "conveyor-gateway",
        "status": "healthy",
        "timestamp": rfc3339_timestamp(),
        "jobs": jobs.len(),
    })))
}
