use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{BackendClient, BackendError};
use crate::analysis::backend::{
    AnalysisBackend, CoverLetterRequest, CoverLetterResponse, GenerateQuestionsRequest,
    GenerateQuestionsResponse, ParseCvRequest, ParseJdRequest, RewriteResumeRequest,
    RewriteResumeResponse, ScoreRequest, ScoreResponse,
};
use crate::workflow::backend::{
    AdaptiveBackend, EvaluateAnswerRequest, EvaluateAnswerResponse, LearningPlansRequest,
    LearningPlansResponse, LearningResourcesRequest, LearningResourcesResponse,
    RefineAnswerRequest, RefineAnswerResponse, SaveLearningPlanRequest, SaveLearningPlanResponse,
    StartAdaptiveRequest, StartAdaptiveResponse, SubmitInputsRequest, SubmitInputsResponse,
};

pub const START_ADAPTIVE: &str = "/api/adaptive-questions/start";
pub const SUBMIT_INPUTS: &str = "/api/adaptive-questions/submit-inputs";
pub const REFINE_ANSWER: &str = "/api/adaptive-questions/refine-answer";
pub const LEARNING_RESOURCES: &str = "/api/adaptive-questions/get-learning-resources";
pub const SAVE_LEARNING_PLAN: &str = "/api/adaptive-questions/save-learning-plan";
pub const LEARNING_PLANS: &str = "/api/adaptive-questions/get-learning-plans";
pub const EVALUATE_ANSWER: &str = "/api/evaluate-answer";

pub const PARSE_CV: &str = "/api/parse-cv";
pub const PARSE_JD: &str = "/api/parse";
pub const CALCULATE_SCORE: &str = "/api/calculate-score";
pub const GENERATE_QUESTIONS: &str = "/api/generate-questions";
pub const REWRITE_RESUME: &str = "/api/rewrite-resume";
pub const GENERATE_COVER_LETTER: &str = "/api/generate-cover-letter";

/// Endpoints that store a record on the backend. They are never retried.
pub const NON_IDEMPOTENT: [&str; 1] = [SAVE_LEARNING_PLAN];

#[async_trait]
impl AdaptiveBackend for BackendClient {
    async fn start_adaptive(
        &self,
        request: StartAdaptiveRequest,
    ) -> Result<StartAdaptiveResponse, BackendError> {
        info!(
            "Starting adaptive workflow for question {} ({})",
            request.question_id, request.experience_check_response
        );
        self.post_json(START_ADAPTIVE, &request).await
    }

    async fn submit_structured_inputs(
        &self,
        request: SubmitInputsRequest,
    ) -> Result<SubmitInputsResponse, BackendError> {
        let response: SubmitInputsResponse = self.post_json(SUBMIT_INPUTS, &request).await?;
        if response.generated_answer.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }
        Ok(response)
    }

    async fn refine_answer(
        &self,
        request: RefineAnswerRequest,
    ) -> Result<RefineAnswerResponse, BackendError> {
        let response: RefineAnswerResponse = self.post_json(REFINE_ANSWER, &request).await?;
        if response.refined_answer.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }
        Ok(response)
    }

    async fn evaluate_answer(
        &self,
        request: EvaluateAnswerRequest,
    ) -> Result<EvaluateAnswerResponse, BackendError> {
        self.post_json(EVALUATE_ANSWER, &request).await
    }

    async fn get_learning_resources(
        &self,
        request: LearningResourcesRequest,
    ) -> Result<LearningResourcesResponse, BackendError> {
        self.post_json(LEARNING_RESOURCES, &request).await
    }

    async fn save_learning_plan(
        &self,
        request: SaveLearningPlanRequest,
    ) -> Result<SaveLearningPlanResponse, BackendError> {
        self.post_json(SAVE_LEARNING_PLAN, &request).await
    }

    async fn get_learning_plans(
        &self,
        request: LearningPlansRequest,
    ) -> Result<LearningPlansResponse, BackendError> {
        self.post_json(LEARNING_PLANS, &request).await
    }
}

#[async_trait]
impl AnalysisBackend for BackendClient {
    async fn parse_cv(&self, request: ParseCvRequest) -> Result<Value, BackendError> {
        self.post_json(PARSE_CV, &request).await
    }

    async fn parse_jd(&self, request: ParseJdRequest) -> Result<Value, BackendError> {
        self.post_json(PARSE_JD, &request).await
    }

    async fn calculate_score(&self, request: ScoreRequest) -> Result<ScoreResponse, BackendError> {
        self.post_json(CALCULATE_SCORE, &request).await
    }

    async fn generate_questions(
        &self,
        request: GenerateQuestionsRequest,
    ) -> Result<GenerateQuestionsResponse, BackendError> {
        self.post_json(GENERATE_QUESTIONS, &request).await
    }

    async fn rewrite_resume(
        &self,
        request: RewriteResumeRequest,
    ) -> Result<RewriteResumeResponse, BackendError> {
        self.post_json(REWRITE_RESUME, &request).await
    }

    async fn generate_cover_letter(
        &self,
        request: CoverLetterRequest,
    ) -> Result<CoverLetterResponse, BackendError> {
        let response: CoverLetterResponse = self.post_json(GENERATE_COVER_LETTER, &request).await?;
        if response.cover_letter.trim().is_empty() {
            return Err(BackendError::EmptyContent);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_and_evaluation_paths_are_top_level() {
        for path in [EVALUATE_ANSWER, PARSE_CV, PARSE_JD, CALCULATE_SCORE, GENERATE_QUESTIONS] {
            assert!(path.starts_with("/api/"));
            assert!(!path.contains("adaptive-questions"));
        }
    }

    #[test]
    fn test_adaptive_paths_share_prefix() {
        for path in [
            START_ADAPTIVE,
            SUBMIT_INPUTS,
            REFINE_ANSWER,
            LEARNING_RESOURCES,
            SAVE_LEARNING_PLAN,
            LEARNING_PLANS,
        ] {
            assert!(path.starts_with("/api/adaptive-questions/"), "{path}");
        }
    }
}
