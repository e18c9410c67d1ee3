//! Analysis pipeline: parse the resume and the job description, score the
//! match, then generate the gap-filling questions the workflow runs on.
//!
//! The two parses are independent and run concurrently; scoring and
//! question generation follow in order. Every step is tracked in
//! `AnalysisState::steps` so the client can render progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{info, warn};

use crate::analysis::backend::{
    AnalysisBackend, CoverLetterRequest, GenerateQuestionsRequest, ParseCvRequest,
    ParseJdRequest, RewriteResumeRequest, ScoreRequest,
};
use crate::analysis::state::{
    AnalysisState, GeneratedDocuments, STEP_CV_PARSING, STEP_JOB_PARSING, STEP_QUESTIONS,
    STEP_REWRITE, STEP_SCORE,
};
use crate::backend_client::BackendError;
use crate::errors::AppError;
use crate::models::question::Question;
use crate::workflow::answers::Answer;

/// Minimum length of each input document, after trimming.
pub const MIN_INPUT_CHARS: usize = 50;
/// Longer inputs are cut to this many characters before parsing.
pub const MAX_INPUT_CHARS: usize = 6200;

/// Trims and truncates one input document, rejecting near-empty ones.
pub fn prepare_input(text: &str, label: &str) -> Result<String, AppError> {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if length < MIN_INPUT_CHARS {
        return Err(AppError::Validation(format!(
            "{label} must be at least {MIN_INPUT_CHARS} characters (got {length})"
        )));
    }
    if length > MAX_INPUT_CHARS {
        warn!("{label} has {length} characters; truncating to {MAX_INPUT_CHARS}");
    }
    Ok(trimmed.chars().take(MAX_INPUT_CHARS).collect())
}

/// Marks `step` from a backend result and converts the error.
fn settle_step<T>(
    state: &mut AnalysisState,
    step: &str,
    result: Result<T, BackendError>,
    started: Instant,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            state.complete_step(step, started.elapsed().as_secs_f64());
            Ok(value)
        }
        Err(e) => {
            warn!("Analysis step {} failed: {}", step, e);
            state.fail_step(step, e.to_string());
            Err(e.into())
        }
    }
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AnalysisPipeline {
    state: Mutex<AnalysisState>,
    backend: Arc<dyn AnalysisBackend>,
    running: AtomicBool,
}

impl AnalysisPipeline {
    pub fn new(backend: Arc<dyn AnalysisBackend>, language: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(AnalysisState::new(language)),
            backend,
            running: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One pipeline run or document generation at a time.
    fn begin(&self) -> Result<RunGuard<'_>, AppError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Conflict("analysis is already running".to_string()))?;
        Ok(RunGuard(&self.running))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> AnalysisState {
        self.lock().clone()
    }

    pub fn question(&self, question_id: &str) -> Option<Question> {
        self.lock().question(question_id).cloned()
    }

    pub fn question_count(&self) -> usize {
        self.lock().questions.len()
    }

    pub fn language(&self) -> String {
        self.lock().language.clone()
    }

    /// Parsed CV and JD, or `Null` before the parses completed.
    pub fn parsed_documents(&self) -> (serde_json::Value, serde_json::Value) {
        let state = self.lock();
        (
            state.parsed_cv.clone().unwrap_or_default(),
            state.parsed_jd.clone().unwrap_or_default(),
        )
    }

    /// Runs the whole analysis, replacing any earlier results.
    pub async fn run_analysis(
        &self,
        resume_text: &str,
        job_description: &str,
        language: &str,
    ) -> Result<AnalysisState, AppError> {
        let resume_text = prepare_input(resume_text, "resume")?;
        let job_description = prepare_input(job_description, "job description")?;
        let _run = self.begin()?;

        {
            let mut state = self.lock();
            *state = AnalysisState::new(language);
            state.start_step(STEP_JOB_PARSING);
            state.start_step(STEP_CV_PARSING);
        }
        info!(
            "Analysis started ({} resume chars, {} job description chars, {})",
            resume_text.len(),
            job_description.len(),
            language
        );

        let cv_request = ParseCvRequest {
            resume_text,
            language: language.to_string(),
        };
        let jd_request = ParseJdRequest {
            job_description,
            language: language.to_string(),
        };
        let started = Instant::now();
        let (cv, jd) = tokio::join!(
            self.backend.parse_cv(cv_request),
            self.backend.parse_jd(jd_request)
        );

        let (parsed_cv, parsed_jd) = {
            let mut state = self.lock();
            let parsed_jd = settle_step(&mut state, STEP_JOB_PARSING, jd, started);
            let parsed_cv = settle_step(&mut state, STEP_CV_PARSING, cv, started);
            if let Ok(jd) = &parsed_jd {
                state.parsed_jd = Some(jd.clone());
            }
            if let Ok(cv) = &parsed_cv {
                state.parsed_cv = Some(cv.clone());
            }
            (parsed_cv?, parsed_jd?)
        };

        self.lock().start_step(STEP_SCORE);
        let started = Instant::now();
        let result = self
            .backend
            .calculate_score(ScoreRequest {
                parsed_cv: parsed_cv.clone(),
                parsed_jd: parsed_jd.clone(),
                language: language.to_string(),
            })
            .await;
        let score = {
            let mut state = self.lock();
            let score = settle_step(&mut state, STEP_SCORE, result, started)?;
            state.score = Some(score.clone());
            score
        };
        info!("Match score {:.0}", score.overall_score);

        let score_result =
            serde_json::to_value(&score).map_err(|e| AppError::Internal(e.into()))?;
        self.lock().start_step(STEP_QUESTIONS);
        let started = Instant::now();
        let result = self
            .backend
            .generate_questions(GenerateQuestionsRequest {
                parsed_cv,
                parsed_jd,
                score_result,
                language: language.to_string(),
            })
            .await;

        let mut state = self.lock();
        let generated = settle_step(&mut state, STEP_QUESTIONS, result, started)?;
        if generated.questions.is_empty() {
            state.fail_step(STEP_QUESTIONS, "no questions generated");
            return Err(BackendError::EmptyContent.into());
        }
        info!("Analysis complete: {} questions", generated.questions.len());
        state.questions = generated.questions;
        Ok(state.clone())
    }

    /// Rewrites the resume with the accepted answers, then writes a cover
    /// letter for the rewritten resume.
    pub async fn generate_documents(
        &self,
        answers: Vec<Answer>,
    ) -> Result<GeneratedDocuments, AppError> {
        if answers.is_empty() {
            return Err(AppError::Validation(
                "accept at least one answer before generating documents".to_string(),
            ));
        }
        let _run = self.begin()?;

        let (parsed_cv, parsed_jd, questions, score, language) = {
            let mut state = self.lock();
            if !state.is_complete() {
                return Err(AppError::InvalidTransition(
                    "run the analysis before generating documents".to_string(),
                ));
            }
            state.start_step(STEP_REWRITE);
            (
                state.parsed_cv.clone().unwrap_or_default(),
                state.parsed_jd.clone().unwrap_or_default(),
                state.questions.clone(),
                state.score.clone(),
                state.language.clone(),
            )
        };

        info!("Rewriting resume with {} accepted answers", answers.len());
        let started = Instant::now();
        let result = self
            .backend
            .rewrite_resume(RewriteResumeRequest {
                updated_cv: parsed_cv.clone(),
                questions,
                answers,
                parsed_jd: parsed_jd.clone(),
                language: language.clone(),
            })
            .await;
        let resume = settle_step(&mut self.lock(), STEP_REWRITE, result, started)?;

        let parsed_resume = if resume.parsed_format.is_null() {
            parsed_cv
        } else {
            resume.parsed_format.clone()
        };
        let score_data = score.and_then(|s| serde_json::to_value(s).ok());
        let cover_letter = self
            .backend
            .generate_cover_letter(CoverLetterRequest {
                parsed_resume,
                parsed_jd,
                score_data,
                language,
            })
            .await?;
        info!("Cover letter generated ({} words)", cover_letter.word_count);

        let documents = GeneratedDocuments {
            resume,
            cover_letter,
        };
        self.lock().documents = Some(documents.clone());
        Ok(documents)
    }
}
