use serde::Serialize;
use serde_json::Value;

use crate::analysis::backend::{CoverLetterResponse, RewriteResumeResponse, ScoreResponse};
use crate::models::question::Question;

pub const STEP_JOB_PARSING: &str = "job-parsing";
pub const STEP_CV_PARSING: &str = "cv-parsing";
pub const STEP_SCORE: &str = "score-calc";
pub const STEP_QUESTIONS: &str = "smart-questions";
pub const STEP_REWRITE: &str = "resume-rewrite";

const STEPS: [(&str, &str); 5] = [
    (STEP_JOB_PARSING, "Job Parsing"),
    (STEP_CV_PARSING, "Resume Parsing"),
    (STEP_SCORE, "Score Calculating"),
    (STEP_QUESTIONS, "Smart Questions"),
    (STEP_REWRITE, "Resume Rewrite"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Loading,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStep {
    pub id: &'static str,
    pub label: &'static str,
    pub status: StepStatus,
    /// 0–100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocuments {
    pub resume: RewriteResumeResponse,
    pub cover_letter: CoverLetterResponse,
}

/// Results of the document analysis for one session.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisState {
    pub language: String,
    pub parsed_cv: Option<Value>,
    pub parsed_jd: Option<Value>,
    pub score: Option<ScoreResponse>,
    pub questions: Vec<Question>,
    pub steps: Vec<AnalysisStep>,
    pub documents: Option<GeneratedDocuments>,
}

impl AnalysisState {
    pub fn new(language: impl Into<String>) -> Self {
        let steps = STEPS
            .iter()
            .map(|&(id, label)| AnalysisStep {
                id,
                label,
                status: StepStatus::Pending,
                progress: 0,
                error: None,
                time_seconds: None,
            })
            .collect();
        Self {
            language: language.into(),
            parsed_cv: None,
            parsed_jd: None,
            score: None,
            questions: Vec::new(),
            steps,
            documents: None,
        }
    }

    pub fn step(&self, id: &str) -> Option<&AnalysisStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    fn step_mut(&mut self, id: &str) -> Option<&mut AnalysisStep> {
        self.steps.iter_mut().find(|step| step.id == id)
    }

    pub fn start_step(&mut self, id: &str) {
        if let Some(step) = self.step_mut(id) {
            step.status = StepStatus::Loading;
            step.progress = 0;
            step.error = None;
            step.time_seconds = None;
        }
    }

    pub fn complete_step(&mut self, id: &str, time_seconds: f64) {
        if let Some(step) = self.step_mut(id) {
            step.status = StepStatus::Complete;
            step.progress = 100;
            step.time_seconds = Some(time_seconds);
        }
    }

    pub fn fail_step(&mut self, id: &str, error: impl Into<String>) {
        if let Some(step) = self.step_mut(id) {
            step.status = StepStatus::Error;
            step.error = Some(error.into());
        }
    }

    /// Questions exist only once every analysis step up to generation succeeded.
    pub fn is_complete(&self) -> bool {
        self.parsed_cv.is_some() && self.parsed_jd.is_some() && !self.questions.is_empty()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}
