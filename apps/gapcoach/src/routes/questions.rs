use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::question::Question;
use crate::sessions::WorkflowSession;
use crate::state::AppState;
use crate::workflow::adaptive_flows::ExperienceLevel;
use crate::workflow::answers::{Answer, InputMode};
use crate::workflow::backend::{
    LearningPreferences, LearningResourcesResponse, SaveLearningPlanResponse,
};
use crate::workflow::evaluations::Evaluation;
use crate::workflow::refinement::RefinementFields;
use crate::workflow::QuestionSnapshot;

type QuestionPath = Path<(Uuid, String)>;

async fn resolve(
    state: &AppState,
    session_id: Uuid,
    question_id: &str,
) -> Result<(std::sync::Arc<WorkflowSession>, Question), AppError> {
    let session = state.sessions.get(session_id).await?;
    let question = session.question(question_id)?;
    Ok((session, question))
}

#[derive(Serialize)]
pub struct QuestionView {
    pub question: Question,
    #[serde(flatten)]
    pub snapshot: QuestionSnapshot,
}

/// GET /api/v1/sessions/:id/questions/:qid
pub async fn handle_get_question(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
) -> Result<Json<QuestionView>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    Ok(Json(QuestionView {
        snapshot: session.workflow.snapshot(&question.id),
        question,
    }))
}

#[derive(Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer_text: String,
    #[serde(default)]
    pub answer_type: InputMode,
    #[serde(default)]
    pub transcription_time: Option<f64>,
}

/// PUT /api/v1/sessions/:id/questions/:qid/answer
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<Answer>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let answer = session.workflow.submit_answer(
        &question.id,
        &req.answer_text,
        req.answer_type,
        req.transcription_time,
    )?;
    Ok(Json(answer))
}

/// POST /api/v1/sessions/:id/questions/:qid/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
) -> Result<Json<Evaluation>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let evaluation = session.workflow.evaluate_answer(&question).await?;
    Ok(Json(evaluation))
}

#[derive(Deserialize)]
pub struct ExperienceRequest {
    pub level: ExperienceLevel,
}

/// POST /api/v1/sessions/:id/questions/:qid/experience
pub async fn handle_choose_experience(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    Json(req): Json<ExperienceRequest>,
) -> Result<Json<QuestionSnapshot>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let context = session.adaptive_context();
    let snapshot = session
        .workflow
        .choose_experience(&question, req.level, context)
        .await?;
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
pub struct DeepDiveRequest {
    pub structured_data: RefinementFields,
}

/// POST /api/v1/sessions/:id/questions/:qid/deep-dive
pub async fn handle_deep_dive(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    Json(req): Json<DeepDiveRequest>,
) -> Result<Json<Answer>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let answer = session
        .workflow
        .submit_structured_inputs(&question.id, req.structured_data)
        .await?;
    Ok(Json(answer))
}

#[derive(Deserialize)]
pub struct RefinementUpdate {
    pub fields: RefinementFields,
}

/// PATCH /api/v1/sessions/:id/questions/:qid/refinement
pub async fn handle_update_refinement(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    Json(req): Json<RefinementUpdate>,
) -> Result<Json<RefinementFields>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let fields = session
        .workflow
        .set_refinement_fields(&question.id, req.fields)?;
    Ok(Json(fields))
}

#[derive(Deserialize)]
pub struct RefineRequest {
    /// Evaluate the refined answer in the same request.
    #[serde(default = "default_true")]
    pub reevaluate: bool,
}

impl Default for RefineRequest {
    fn default() -> Self {
        Self { reevaluate: true }
    }
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/sessions/:id/questions/:qid/refine
/// Body is optional; defaults to refine-then-evaluate.
pub async fn handle_refine(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    req: Option<Json<RefineRequest>>,
) -> Result<Json<QuestionSnapshot>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let Json(req) = req.unwrap_or_default();
    if req.reevaluate {
        session.workflow.refine_and_reevaluate(&question).await?;
    } else {
        session.workflow.refine_answer(&question).await?;
    }
    Ok(Json(session.workflow.snapshot(&question.id)))
}

/// POST /api/v1/sessions/:id/questions/:qid/accept
pub async fn handle_accept(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
) -> Result<Json<QuestionSnapshot>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    Ok(Json(session.workflow.accept_anyway(&question.id)?))
}

/// POST /api/v1/sessions/:id/questions/:qid/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
) -> Result<Json<QuestionSnapshot>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    Ok(Json(session.workflow.cancel_adaptive_flow(&question.id)?))
}

/// POST /api/v1/sessions/:id/questions/:qid/learning-resources
pub async fn handle_learning_resources(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    preferences: Option<Json<LearningPreferences>>,
) -> Result<Json<LearningResourcesResponse>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let Json(preferences) = preferences.unwrap_or_default();
    let resources = session
        .workflow
        .fetch_learning_resources(&question, preferences)
        .await?;
    Ok(Json(resources))
}

#[derive(Deserialize)]
pub struct SavePlanRequest {
    pub resource_ids: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/v1/sessions/:id/questions/:qid/learning-plan
pub async fn handle_save_learning_plan(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
    Json(req): Json<SavePlanRequest>,
) -> Result<Json<SaveLearningPlanResponse>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    let saved = session
        .workflow
        .save_learning_plan(&question, &session.user_id, req.resource_ids, req.notes)
        .await?;
    Ok(Json(saved))
}

/// POST /api/v1/sessions/:id/questions/:qid/learning-complete
pub async fn handle_learning_complete(
    State(state): State<AppState>,
    Path((id, qid)): QuestionPath,
) -> Result<Json<QuestionSnapshot>, AppError> {
    let (session, question) = resolve(&state, id, &qid).await?;
    Ok(Json(session.workflow.finish_learning_flow(&question.id)?))
}
