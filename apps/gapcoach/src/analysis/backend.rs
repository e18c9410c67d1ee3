use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend_client::BackendError;
use crate::models::question::Question;
use crate::workflow::answers::Answer;

// ────────────────────────────────────────────────────────────────────────────
// Requests
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ParseCvRequest {
    pub resume_text: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseJdRequest {
    pub job_description: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub parsed_cv: Value,
    pub parsed_jd: Value,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateQuestionsRequest {
    pub parsed_cv: Value,
    pub parsed_jd: Value,
    pub score_result: Value,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteResumeRequest {
    pub updated_cv: Value,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub parsed_jd: Value,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverLetterRequest {
    pub parsed_resume: Value,
    pub parsed_jd: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_data: Option<Value>,
    pub language: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Responses
// ────────────────────────────────────────────────────────────────────────────

/// Parsed CV/JD and score payloads are passed through to later calls
/// untouched, so they stay as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    #[serde(default)]
    pub overall_score: f64,
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuestionsResponse {
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub total_questions: usize,
    #[serde(default)]
    pub time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResumeResponse {
    /// Display format (camelCase keys, HTML descriptions).
    #[serde(default)]
    pub sample_format: Value,
    /// Same content in the parsed CV shape.
    #[serde(default)]
    pub parsed_format: Value,
    #[serde(default)]
    pub enhancements_made: Vec<String>,
    #[serde(default)]
    pub time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverLetterResponse {
    pub cover_letter: String,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub time_seconds: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait
// ────────────────────────────────────────────────────────────────────────────

/// Document analysis calls that produce the questions the workflow runs on.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn parse_cv(&self, request: ParseCvRequest) -> Result<Value, BackendError>;

    async fn parse_jd(&self, request: ParseJdRequest) -> Result<Value, BackendError>;

    async fn calculate_score(&self, request: ScoreRequest) -> Result<ScoreResponse, BackendError>;

    async fn generate_questions(
        &self,
        request: GenerateQuestionsRequest,
    ) -> Result<GenerateQuestionsResponse, BackendError>;

    async fn rewrite_resume(
        &self,
        request: RewriteResumeRequest,
    ) -> Result<RewriteResumeResponse, BackendError>;

    async fn generate_cover_letter(
        &self,
        request: CoverLetterRequest,
    ) -> Result<CoverLetterResponse, BackendError>;
}
