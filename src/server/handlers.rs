//! Route handlers.
//!
//! Each handler authenticates the caller, hands the request to the matching
//! [`App`] operation and wraps the result in the success envelope.

use std::sync::Arc;

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::extract::{CurrentUser, JsonBody};
use crate::ai::{QualityAssessment, TaskBreakdown, WorkloadRisk};
use crate::app::App;
use crate::core::{Evidence, Project, Task, TaskPatch, User};
use crate::service::{
    AuditEntry, ChartPoint, EmployeePerformance, EmployeeStats, EvidenceInput, HrStats,
    NewProject, NewTask, NewUser, PmStats, ProjectDetail, ProjectPatch, ProjectSummary,
    ScanReport, TaskDetail, UploadRequest, UserPatch,
};
use crate::upload::UploadedFile;

/// Successful response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;
type Created<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope { success: true, data }))
}

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(Envelope { success: true, data })))
}

type AppState = State<Arc<App>>;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

// ============================================================================
// Tasks
// ============================================================================

pub async fn list_my_tasks(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<Task>> {
    ok(app.my_tasks(&actor)?)
}

pub async fn get_task(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<TaskDetail> {
    ok(app.task_detail(&actor, &id)?)
}

pub async fn update_task(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<TaskPatch>,
) -> ApiResult<Task> {
    ok(app.update_task(&actor, &id, patch, Utc::now())?)
}

pub async fn submit_evidence(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<EvidenceInput>,
) -> Created<Evidence> {
    created(app.submit_evidence(&actor, &id, input, Utc::now()).await?)
}

pub async fn breakdown_task(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<TaskBreakdown> {
    ok(app.breakdown_task(&actor, &id).await?)
}

// ============================================================================
// AI analyses
// ============================================================================

/// Body of `POST /ai/analyze-quality`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityRequest {
    #[serde(default)]
    pub task_id: String,
}

pub async fn analyze_quality(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    JsonBody(request): JsonBody<QualityRequest>,
) -> ApiResult<QualityAssessment> {
    let task_id = request.task_id.trim();
    if task_id.is_empty() {
        return Err(ApiError::bad_request("Task ID is required"));
    }
    ok(app.analyze_task_quality(&actor, task_id, Utc::now()).await?)
}

pub async fn workload_risk(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<WorkloadRisk> {
    ok(app.workload_risk(&actor).await?)
}

// ============================================================================
// Audit
// ============================================================================

pub async fn audit_queue(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<AuditEntry>> {
    ok(app.audit_queue(&actor)?)
}

pub async fn audit_scan(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<ScanReport> {
    ok(app.audit_scan(&actor, Utc::now()).await?)
}

// ============================================================================
// Projects
// ============================================================================

pub async fn list_projects(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<ProjectSummary>> {
    ok(app.list_projects(&actor)?)
}

pub async fn create_project(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    JsonBody(input): JsonBody<NewProject>,
) -> Created<Project> {
    created(app.create_project(&actor, input, Utc::now())?)
}

pub async fn get_project(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<ProjectDetail> {
    ok(app.project_detail(&actor, &id)?)
}

pub async fn update_project(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ProjectPatch>,
) -> ApiResult<Project> {
    ok(app.update_project(&actor, &id, patch, Utc::now())?)
}

pub async fn delete_project(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    app.delete_project(&actor, &id)?;
    Ok(Json(json!({ "success": true, "message": "Project deleted successfully" })))
}

pub async fn add_task(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<NewTask>,
) -> Created<Task> {
    created(app.add_task(&actor, &id, input, Utc::now())?)
}

// ============================================================================
// Users
// ============================================================================

pub async fn signup(State(app): AppState, JsonBody(input): JsonBody<NewUser>) -> Created<User> {
    created(app.signup(input, Utc::now())?)
}

pub async fn list_users(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<User>> {
    ok(app.list_users(&actor)?)
}

pub async fn update_user(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<User> {
    ok(app.update_user(&actor, &id, patch)?)
}

// ============================================================================
// Dashboards
// ============================================================================

pub async fn employee_stats(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<EmployeeStats> {
    ok(app.employee_stats(&actor, Utc::now())?)
}

pub async fn employee_chart(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<Vec<ChartPoint>> {
    ok(app.employee_chart(&actor, Utc::now())?)
}

pub async fn employee_performance(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<EmployeePerformance> {
    ok(app.employee_performance(&actor, Utc::now())?)
}

pub async fn pm_stats(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<PmStats> {
    ok(app.pm_stats(&actor)?)
}

pub async fn hr_stats(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<HrStats> {
    ok(app.hr_stats(&actor)?)
}

// ============================================================================
// Uploads
// ============================================================================

/// Multipart form with a `file` part and an optional `folder` field.
pub async fn upload(
    State(app): AppState,
    CurrentUser(actor): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadedFile> {
    let mut multipart = multipart?;
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                request.filename = field.file_name().unwrap_or_default().to_string();
                request.bytes = field.bytes().await?.to_vec();
            }
            Some("folder") => request.folder = Some(field.text().await?),
            _ => {}
        }
    }

    ok(app.upload_file(&actor, request).await?)
}
