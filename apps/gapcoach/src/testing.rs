//! Scripted in-memory backend for tests.
//!
//! Replies are queued per operation and consumed in order. Each call is
//! recorded with its serialized payload so tests can assert on what was sent.
//!
//! ```ignore
//! let backend = MockBackend::new()
//!     .with_reply(ops::EVALUATE, evaluation_reply(4.0))
//!     .with_error(ops::EVALUATE, 503, "overloaded");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::analysis::backend::{
    AnalysisBackend, CoverLetterRequest, CoverLetterResponse, GenerateQuestionsRequest,
    GenerateQuestionsResponse, ParseCvRequest, ParseJdRequest, RewriteResumeRequest,
    RewriteResumeResponse, ScoreRequest, ScoreResponse,
};
use crate::backend_client::BackendError;
use crate::workflow::backend::{
    AdaptiveBackend, EvaluateAnswerRequest, EvaluateAnswerResponse, LearningPlansRequest,
    LearningPlansResponse, LearningResourcesRequest, LearningResourcesResponse,
    RefineAnswerRequest, RefineAnswerResponse, SaveLearningPlanRequest, SaveLearningPlanResponse,
    StartAdaptiveRequest, StartAdaptiveResponse, SubmitInputsRequest, SubmitInputsResponse,
};

/// Operation names used to key queued replies and recorded calls.
pub mod ops {
    pub const START: &str = "start_adaptive";
    pub const SUBMIT_INPUTS: &str = "submit_structured_inputs";
    pub const REFINE: &str = "refine_answer";
    pub const EVALUATE: &str = "evaluate_answer";
    pub const LEARNING_RESOURCES: &str = "get_learning_resources";
    pub const SAVE_PLAN: &str = "save_learning_plan";
    pub const LEARNING_PLANS: &str = "get_learning_plans";
    pub const PARSE_CV: &str = "parse_cv";
    pub const PARSE_JD: &str = "parse_jd";
    pub const SCORE: &str = "calculate_score";
    pub const QUESTIONS: &str = "generate_questions";
    pub const REWRITE: &str = "rewrite_resume";
    pub const COVER_LETTER: &str = "generate_cover_letter";
}

#[derive(Debug, Clone)]
enum MockReply {
    Success(Value),
    Error { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub payload: Value,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    replies: Arc<Mutex<HashMap<&'static str, VecDeque<MockReply>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, operation: &'static str, reply: Value) -> Self {
        self.push(operation, MockReply::Success(reply));
        self
    }

    pub fn with_error(self, operation: &'static str, status: u16, message: &str) -> Self {
        self.push(
            operation,
            MockReply::Error {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// Simulated latency applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues a reply on an already shared mock.
    pub fn push_reply(&self, operation: &'static str, reply: Value) {
        self.push(operation, MockReply::Success(reply));
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self, operation: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.payload.clone())
            .collect()
    }

    fn push(&self, operation: &'static str, reply: MockReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(reply);
    }

    async fn respond<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: &Req,
    ) -> Result<Resp, BackendError> {
        self.calls.lock().unwrap().push(RecordedCall {
            operation,
            payload: serde_json::to_value(request).unwrap(),
        });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(MockReply::Success(value)) => Ok(serde_json::from_value(value)?),
            Some(MockReply::Error { status, message }) => Err(BackendError::Api { status, message }),
            None => Err(BackendError::Api {
                status: 500,
                message: format!("no mock reply queued for {operation}"),
            }),
        }
    }
}

#[async_trait]
impl AdaptiveBackend for MockBackend {
    async fn start_adaptive(
        &self,
        request: StartAdaptiveRequest,
    ) -> Result<StartAdaptiveResponse, BackendError> {
        self.respond(ops::START, &request).await
    }

    async fn submit_structured_inputs(
        &self,
        request: SubmitInputsRequest,
    ) -> Result<SubmitInputsResponse, BackendError> {
        self.respond(ops::SUBMIT_INPUTS, &request).await
    }

    async fn refine_answer(
        &self,
        request: RefineAnswerRequest,
    ) -> Result<RefineAnswerResponse, BackendError> {
        self.respond(ops::REFINE, &request).await
    }

    async fn evaluate_answer(
        &self,
        request: EvaluateAnswerRequest,
    ) -> Result<EvaluateAnswerResponse, BackendError> {
        self.respond(ops::EVALUATE, &request).await
    }

    async fn get_learning_resources(
        &self,
        request: LearningResourcesRequest,
    ) -> Result<LearningResourcesResponse, BackendError> {
        self.respond(ops::LEARNING_RESOURCES, &request).await
    }

    async fn save_learning_plan(
        &self,
        request: SaveLearningPlanRequest,
    ) -> Result<SaveLearningPlanResponse, BackendError> {
        self.respond(ops::SAVE_PLAN, &request).await
    }

    async fn get_learning_plans(
        &self,
        request: LearningPlansRequest,
    ) -> Result<LearningPlansResponse, BackendError> {
        self.respond(ops::LEARNING_PLANS, &request).await
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    async fn parse_cv(&self, request: ParseCvRequest) -> Result<Value, BackendError> {
        self.respond(ops::PARSE_CV, &request).await
    }

    async fn parse_jd(&self, request: ParseJdRequest) -> Result<Value, BackendError> {
        self.respond(ops::PARSE_JD, &request).await
    }

    async fn calculate_score(&self, request: ScoreRequest) -> Result<ScoreResponse, BackendError> {
        self.respond(ops::SCORE, &request).await
    }

    async fn generate_questions(
        &self,
        request: GenerateQuestionsRequest,
    ) -> Result<GenerateQuestionsResponse, BackendError> {
        self.respond(ops::QUESTIONS, &request).await
    }

    async fn rewrite_resume(
        &self,
        request: RewriteResumeRequest,
    ) -> Result<RewriteResumeResponse, BackendError> {
        self.respond(ops::REWRITE, &request).await
    }

    async fn generate_cover_letter(
        &self,
        request: CoverLetterRequest,
    ) -> Result<CoverLetterResponse, BackendError> {
        self.respond(ops::COVER_LETTER, &request).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Canned replies
// ────────────────────────────────────────────────────────────────────────────

/// Evaluation reply; the backend's own `is_acceptable` mirrors the score.
pub fn evaluation_reply(score: f64) -> Value {
    json!({
        "quality_score": score,
        "quality_issues": ["Lacks quantifiable metrics"],
        "quality_strengths": ["Clear ownership"],
        "improvement_suggestions": [
            {"issue": "No numbers", "suggestion": "Add user counts", "priority": "high"}
        ],
        "is_acceptable": score >= 7.0,
        "time_seconds": 1.2,
        "model": "mock-evaluator"
    })
}

pub fn deep_dive_reply(question_id: &str) -> Value {
    json!({
        "question_id": question_id,
        "current_step": "deep_dive",
        "deep_dive_prompts": [
            {"id": "context", "type": "textarea", "question": "What was the project?", "required": true},
            {"id": "duration", "type": "select", "question": "How long?", "options": ["<6 months", "6-12 months"], "required": true}
        ]
    })
}

pub fn learning_start_reply(question_id: &str) -> Value {
    json!({
        "question_id": question_id,
        "current_step": "resources",
        "suggested_resources": [resource_json("r1")]
    })
}

pub fn generated_answer_reply(question_id: &str, answer: &str) -> Value {
    json!({
        "question_id": question_id,
        "generated_answer": answer,
        "quality_score": 6.5,
        "current_step": "quality_evaluation"
    })
}

pub fn refined_answer_reply(question_id: &str, answer: &str) -> Value {
    json!({
        "question_id": question_id,
        "refined_answer": answer,
        "quality_score": 9.9,
        "is_acceptable": true,
        "iteration": 1
    })
}

pub fn learning_resources_reply() -> Value {
    json!({
        "resources": [resource_json("r1"), resource_json("r2")],
        "learning_path": {
            "timeline": [
                {"resource_id": "r1", "resource_title": "Resource r1", "type": "course",
                 "start_day": 1, "end_day": 3, "duration_days": 3}
            ],
            "total_days": 3,
            "estimated_completion": "3 days"
        }
    })
}

pub fn saved_plan_reply(plan_id: &str) -> Value {
    json!({"plan_id": plan_id, "success": true})
}

fn resource_json(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Resource {id}"),
        "description": "Hands-on course",
        "type": "course",
        "provider": "Coursera",
        "url": format!("https://example.com/{id}"),
        "duration_days": 3,
        "difficulty": "beginner",
        "cost": "free",
        "skills_covered": ["kafka"]
    })
}

pub fn questions_reply() -> Value {
    json!({
        "success": true,
        "questions": [
            {"id": "q1", "number": 1, "title": "Kafka", "priority": "CRITICAL",
             "question_text": "Have you built streaming pipelines?", "context_why": "JD requires Kafka"},
            {"id": "q2", "number": 2, "title": "Leadership", "priority": "HIGH",
             "question_text": "Have you led a team?", "context_why": "Senior role"}
        ],
        "total_questions": 2,
        "time_seconds": 4.2
    })
}
