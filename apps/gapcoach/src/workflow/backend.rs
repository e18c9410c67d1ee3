//! Adaptive workflow backend port.
//!
//! The orchestrator talks to the AI backend only through `AdaptiveBackend`.
//! `BackendClient` implements it over HTTP; tests use the scripted mock.
//! Carried as `Arc<dyn AdaptiveBackend>`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend_client::BackendError;
use crate::models::question::{GapInfo, Question};
use crate::workflow::evaluations::FeedbackItem;

// ────────────────────────────────────────────────────────────────────────────
// Start adaptive workflow
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StartAdaptiveRequest {
    pub question_id: String,
    pub question_text: String,
    pub question_data: Question,
    pub gap_info: GapInfo,
    pub user_id: String,
    pub parsed_cv: Value,
    pub parsed_jd: Value,
    pub experience_check_response: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    #[default]
    Text,
    Textarea,
    Select,
    Multiselect,
    Number,
}

/// A structured follow-up prompt for users who have the experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepDivePrompt {
    pub id: String,
    #[serde(rename = "type", default)]
    pub prompt_type: PromptType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningResource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// course | project | certification
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub provider: String,
    pub url: String,
    #[serde(default)]
    pub duration_days: u32,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub skills_covered: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartAdaptiveResponse {
    #[serde(default)]
    pub question_id: String,
    pub current_step: String,
    #[serde(default)]
    pub deep_dive_prompts: Vec<DeepDivePrompt>,
    #[serde(default)]
    pub suggested_resources: Vec<LearningResource>,
    #[serde(default)]
    pub resume_addition: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Deep dive, refinement, evaluation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SubmitInputsRequest {
    pub question_id: String,
    pub structured_data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitInputsResponse {
    #[serde(default)]
    pub question_id: String,
    pub generated_answer: String,
    /// Preliminary score from the generator; not used for acceptance.
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub current_step: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineAnswerRequest {
    pub question_id: String,
    pub question_text: String,
    pub question_data: Question,
    pub gap_info: GapInfo,
    pub generated_answer: String,
    pub quality_issues: Vec<String>,
    pub additional_data: BTreeMap<String, String>,
}

/// The refined answer always goes back through `evaluate_answer`; any score
/// returned here is informational.
#[derive(Debug, Clone, Deserialize)]
pub struct RefineAnswerResponse {
    #[serde(default)]
    pub question_id: String,
    pub refined_answer: String,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub is_acceptable: Option<bool>,
    #[serde(default)]
    pub iteration: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateAnswerRequest {
    pub question_id: String,
    pub question_text: String,
    pub answer_text: String,
    pub gap_info: GapInfo,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateAnswerResponse {
    pub quality_score: f64,
    #[serde(default)]
    pub quality_issues: Vec<FeedbackItem>,
    #[serde(default)]
    pub quality_strengths: Vec<FeedbackItem>,
    #[serde(default)]
    pub improvement_suggestions: Vec<FeedbackItem>,
    /// Backend's own verdict; the orchestrator applies its policy instead.
    #[serde(default)]
    pub is_acceptable: bool,
    #[serde(default)]
    pub time_seconds: f64,
    #[serde(default)]
    pub model: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Learning resources and plans
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostPreference {
    Free,
    Paid,
    #[default]
    Any,
}

/// Filters for the learning resource search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningPreferences {
    pub user_level: SkillLevel,
    pub max_days: u32,
    pub cost_preference: CostPreference,
    pub limit: u32,
}

impl Default for LearningPreferences {
    fn default() -> Self {
        Self {
            user_level: SkillLevel::Intermediate,
            max_days: 10,
            cost_preference: CostPreference::Any,
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningResourcesRequest {
    pub gap: GapInfo,
    #[serde(flatten)]
    pub preferences: LearningPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub resource_id: String,
    pub resource_title: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    pub start_day: u32,
    pub end_day: u32,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    #[serde(default)]
    pub timeline: Vec<TimelineStep>,
    #[serde(default)]
    pub total_days: u32,
    #[serde(default)]
    pub estimated_completion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningResourcesResponse {
    #[serde(default)]
    pub resources: Vec<LearningResource>,
    #[serde(default)]
    pub learning_path: LearningPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveLearningPlanRequest {
    pub user_id: String,
    pub gap: GapInfo,
    pub resource_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveLearningPlanResponse {
    pub plan_id: String,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Suggested,
    InProgress,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningPlansRequest {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlanItem {
    pub id: String,
    pub gap_title: String,
    #[serde(default)]
    pub gap_description: String,
    #[serde(default)]
    pub resource_ids: Vec<String>,
    pub status: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlansResponse {
    #[serde(default)]
    pub plans: Vec<LearningPlanItem>,
    #[serde(default)]
    pub total: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait AdaptiveBackend: Send + Sync {
    async fn start_adaptive(
        &self,
        request: StartAdaptiveRequest,
    ) -> Result<StartAdaptiveResponse, BackendError>;

    async fn submit_structured_inputs(
        &self,
        request: SubmitInputsRequest,
    ) -> Result<SubmitInputsResponse, BackendError>;

    async fn refine_answer(
        &self,
        request: RefineAnswerRequest,
    ) -> Result<RefineAnswerResponse, BackendError>;

    async fn evaluate_answer(
        &self,
        request: EvaluateAnswerRequest,
    ) -> Result<EvaluateAnswerResponse, BackendError>;

    async fn get_learning_resources(
        &self,
        request: LearningResourcesRequest,
    ) -> Result<LearningResourcesResponse, BackendError>;

    async fn save_learning_plan(
        &self,
        request: SaveLearningPlanRequest,
    ) -> Result<SaveLearningPlanResponse, BackendError>;

    async fn get_learning_plans(
        &self,
        request: LearningPlansRequest,
    ) -> Result<LearningPlansResponse, BackendError>;
}
