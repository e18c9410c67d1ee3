use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::analysis::state::{AnalysisState, GeneratedDocuments};
use crate::errors::AppError;
use crate::sessions::SessionInfo;
use crate::state::AppState;
use crate::workflow::backend::{LearningPlansResponse, PlanStatus};
use crate::workflow::ui::{UiCommand, UiState};

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionInfo>), AppError> {
    let session = state.sessions.create(&req.user_id, req.language).await?;
    Ok((StatusCode::CREATED, Json(session.info())))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.info()))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/reset
/// Drops all workflow state; analysis results are kept.
pub async fn handle_reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, AppError> {
    let session = state.sessions.get(id).await?;
    session.workflow.reset();
    Ok(Json(session.info()))
}

#[derive(Deserialize)]
pub struct RunAnalysisRequest {
    pub resume_text: String,
    pub job_description: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// POST /api/v1/sessions/:id/analysis
/// Re-running the analysis replaces the questions, so the workflow restarts.
pub async fn handle_run_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RunAnalysisRequest>,
) -> Result<Json<AnalysisState>, AppError> {
    let session = state.sessions.get(id).await?;
    let language = req
        .language
        .unwrap_or_else(|| session.workflow.language().to_string());
    let analysis = session
        .analysis
        .run_analysis(&req.resume_text, &req.job_description, &language)
        .await?;
    session.workflow.reset();
    Ok(Json(analysis))
}

/// GET /api/v1/sessions/:id/analysis
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisState>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.analysis.snapshot()))
}

/// POST /api/v1/sessions/:id/documents
/// Rewrites the resume from accepted answers and writes a cover letter.
pub async fn handle_generate_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GeneratedDocuments>, AppError> {
    let session = state.sessions.get(id).await?;
    let answers = session.workflow.accepted_answers();
    let documents = session.analysis.generate_documents(answers).await?;
    Ok(Json(documents))
}

#[derive(Deserialize)]
pub struct LearningPlansQuery {
    #[serde(default)]
    pub status: Option<PlanStatus>,
}

/// GET /api/v1/sessions/:id/learning-plans
pub async fn handle_learning_plans(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LearningPlansQuery>,
) -> Result<Json<LearningPlansResponse>, AppError> {
    let session = state.sessions.get(id).await?;
    let plans = session
        .workflow
        .learning_plans(&session.user_id, params.status)
        .await?;
    Ok(Json(plans))
}

/// GET /api/v1/sessions/:id/ui
pub async fn handle_get_ui(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UiState>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.workflow.ui_state()))
}

/// PUT /api/v1/sessions/:id/ui
pub async fn handle_update_ui(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(command): Json<UiCommand>,
) -> Result<Json<UiState>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.workflow.apply_ui(command)))
}
