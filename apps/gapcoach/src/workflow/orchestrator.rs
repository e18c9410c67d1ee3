//! Workflow orchestrator: drives each question through its lifecycle.
//!
//! ```text
//! UNSTARTED --plain answer--> AWAITING_EVALUATION
//! UNSTARTED --confirmed/some experience--> DEEP_DIVE_PROMPTS --inputs--> AWAITING_EVALUATION
//! UNSTARTED --willing to learn--> LEARNING_RESOURCES --plan saved / finished--> FLOW_COMPLETE
//! UNSTARTED --no experience--> NO_EXPERIENCE
//! AWAITING_EVALUATION --acceptable--> ACCEPTED
//! AWAITING_EVALUATION --below threshold, under cap--> NEEDS_REFINEMENT
//! AWAITING_EVALUATION --below threshold, at cap--> ACCEPTED (iteration cap)
//! NEEDS_REFINEMENT --refine--> REFINING --refined answer--> AWAITING_EVALUATION
//! NEEDS_REFINEMENT --accept anyway--> ACCEPTED (user forced)
//! ```
//!
//! All state sits behind one `std::sync::Mutex` that is never held across
//! an `.await`. Backend calls run unlocked; each one first claims its
//! question id, so a second call for the same question fails with
//! `Conflict` while calls for different questions interleave freely.
//! A claim is released when the call settles or when its future is dropped.
//!
//! `reset()` bumps an epoch counter. A call that settles after a reset
//! discards its result instead of writing into the fresh state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::question::Question;
use crate::workflow::adaptive_flows::{AdaptiveFlowRegistry, AdaptivePath, ExperienceLevel};
use crate::workflow::answers::{Answer, AnswerStore, InputMode};
use crate::workflow::backend::{
    AdaptiveBackend, DeepDivePrompt, EvaluateAnswerRequest, EvaluateAnswerResponse,
    LearningPath, LearningPlansRequest, LearningPlansResponse, LearningPreferences,
    LearningResource, LearningResourcesRequest, LearningResourcesResponse, PlanStatus,
    RefineAnswerRequest, RefineAnswerResponse, SaveLearningPlanRequest,
    SaveLearningPlanResponse, StartAdaptiveRequest, SubmitInputsRequest,
};
use crate::workflow::evaluations::{Evaluation, EvaluationStore};
use crate::workflow::policy::{self, Verdict};
use crate::workflow::refinement::{RefinementFields, RefinementTracker};
use crate::workflow::stage::{AcceptanceReason, PendingOperation, QuestionStage};
use crate::workflow::ui::{UiCommand, UiState};

/// User and document context the backend needs to tailor an adaptive flow.
#[derive(Debug, Clone)]
pub struct AdaptiveContext {
    pub user_id: String,
    pub parsed_cv: Value,
    pub parsed_jd: Value,
}

/// What the backend produced for a question inside an adaptive branch.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AdaptiveOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deep_dive_prompts: Vec<DeepDivePrompt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub learning_resources: Vec<LearningResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_path: Option<LearningPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

/// Everything known about one question, as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionSnapshot {
    pub question_id: String,
    #[serde(serialize_with = "stage_label")]
    pub stage: QuestionStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptance_reason: Option<AcceptanceReason>,
    pub answer: Option<Answer>,
    pub evaluation: Option<Evaluation>,
    pub refinement_fields: Option<RefinementFields>,
    pub iteration: u32,
    pub experience_level: Option<ExperienceLevel>,
    pub pending: Option<PendingOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<AdaptiveOutput>,
}

fn stage_label<S: Serializer>(stage: &QuestionStage, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(stage.label())
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub answered: usize,
    pub accepted: usize,
    pub active_flows: usize,
    pub evaluating: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Claim {
    operation: PendingOperation,
    epoch: u64,
}

#[derive(Debug, Default)]
struct WorkflowContext {
    answers: AnswerStore,
    evaluations: EvaluationStore,
    refinement: RefinementTracker,
    flows: AdaptiveFlowRegistry,
    ui: UiState,
    stages: HashMap<String, QuestionStage>,
    adaptive: HashMap<String, AdaptiveOutput>,
    pending: HashMap<String, Claim>,
    /// Refined answers whose follow-up evaluation has not succeeded yet.
    unevaluated_refinements: HashSet<String>,
    epoch: u64,
}

impl WorkflowContext {
    fn stage(&self, question_id: &str) -> QuestionStage {
        self.stages.get(question_id).copied().unwrap_or_default()
    }

    fn set_stage(&mut self, question_id: &str, stage: QuestionStage) {
        let previous = self.stage(question_id);
        debug!(
            "Question {} stage {} -> {}",
            question_id,
            previous.label(),
            stage.label()
        );
        self.stages.insert(question_id.to_string(), stage);
    }

    fn require_stage(
        &self,
        question_id: &str,
        action: &str,
        allowed: impl Fn(QuestionStage) -> bool,
    ) -> Result<QuestionStage, AppError> {
        let stage = self.stage(question_id);
        if allowed(stage) {
            Ok(stage)
        } else {
            Err(AppError::InvalidTransition(format!(
                "cannot {action} question {question_id} in stage {}",
                stage.label()
            )))
        }
    }

    fn ensure_idle(&self, question_id: &str) -> Result<(), AppError> {
        match self.pending.get(question_id) {
            Some(claim) => Err(AppError::Conflict(format!(
                "{:?} already in progress for question {question_id}",
                claim.operation
            ))),
            None => Ok(()),
        }
    }

    fn claim(&mut self, question_id: &str, operation: PendingOperation) -> Result<u64, AppError> {
        self.ensure_idle(question_id)?;
        self.pending.insert(
            question_id.to_string(),
            Claim {
                operation,
                epoch: self.epoch,
            },
        );
        Ok(self.epoch)
    }

    fn retag(&mut self, question_id: &str, operation: PendingOperation) {
        if let Some(claim) = self.pending.get_mut(question_id) {
            claim.operation = operation;
        }
    }

    /// Drops the claim made in `epoch`, if it is still the current one.
    fn release(&mut self, question_id: &str, epoch: u64) {
        let owned = self
            .pending
            .get(question_id)
            .map(|claim| claim.epoch == epoch)
            .unwrap_or(false);
        if owned {
            self.pending.remove(question_id);
            if self.evaluations.evaluating() == Some(question_id) {
                self.evaluations.clear_evaluating();
            }
        }
    }

    /// Leaves the adaptive branch, if the question was in one.
    fn leave_flow(&mut self, question_id: &str) {
        if self.flows.complete(question_id) {
            debug!("Adaptive flow for question {} closed", question_id);
        }
        self.adaptive.remove(question_id);
    }

    fn finalize(&mut self, question_id: &str, reason: AcceptanceReason) {
        self.refinement.accept(question_id);
        self.leave_flow(question_id);
        self.set_stage(question_id, QuestionStage::Accepted { reason });
        info!("Question {} accepted ({:?})", question_id, reason);
    }

    fn apply_evaluation(
        &mut self,
        question_id: &str,
        answer_text: String,
        response: EvaluateAnswerResponse,
    ) -> Evaluation {
        let score = policy::normalize_score(response.quality_score);
        let iteration = self.refinement.iteration(question_id);
        let verdict = policy::judge(score, iteration);

        if response.is_acceptable != verdict.is_acceptable() {
            debug!(
                "Backend verdict for question {} ({}) overridden by policy ({:?})",
                question_id, response.is_acceptable, verdict
            );
        }

        self.unevaluated_refinements.remove(question_id);
        let evaluation = Evaluation {
            question_id: question_id.to_string(),
            answer_text,
            quality_score: score,
            quality_issues: response.quality_issues,
            quality_strengths: response.quality_strengths,
            improvement_suggestions: response.improvement_suggestions,
            is_acceptable: verdict.is_acceptable(),
            latency_seconds: response.time_seconds,
            model: response.model,
        };

        if self
            .evaluations
            .set_evaluation(evaluation.clone(), &mut self.refinement)
        {
            debug!("Seeded refinement fields for question {}", question_id);
        }

        info!(
            "Question {} scored {:.1} at iteration {} -> {:?}",
            question_id, score, iteration, verdict
        );

        match verdict {
            Verdict::Accepted(reason) => self.finalize(question_id, reason),
            Verdict::NeedsRefinement => self.set_stage(question_id, QuestionStage::NeedsRefinement),
        }
        evaluation
    }

    /// Stores the refined answer and counts the cycle. The backend's own
    /// score is not trusted; the answer goes back to evaluation.
    fn apply_refinement(
        &mut self,
        question_id: &str,
        response: RefineAnswerResponse,
    ) -> Result<Answer, AppError> {
        if let Some(score) = response.quality_score {
            debug!(
                "Ignoring refine-time score {} for question {}; re-evaluating",
                score, question_id
            );
        }
        let answer = self
            .answers
            .set_answer(question_id, response.refined_answer, InputMode::Text, None)?
            .clone();
        let iteration = self.refinement.increment_iteration(question_id);
        self.unevaluated_refinements.insert(question_id.to_string());
        self.set_stage(question_id, QuestionStage::AwaitingEvaluation);
        info!(
            "Question {} refined (iteration {})",
            question_id, iteration
        );
        Ok(answer)
    }

    fn snapshot(&self, question_id: &str) -> QuestionSnapshot {
        let stored = self.stage(question_id);
        let pending = self.pending.get(question_id).map(|claim| claim.operation);
        let stage = match (stored, pending) {
            (QuestionStage::NeedsRefinement, Some(PendingOperation::Refining)) => {
                QuestionStage::Refining
            }
            _ => stored,
        };
        let acceptance_reason = match stage {
            QuestionStage::Accepted { reason } => Some(reason),
            _ => None,
        };

        QuestionSnapshot {
            question_id: question_id.to_string(),
            stage,
            acceptance_reason,
            answer: self.answers.get_answer(question_id).cloned(),
            evaluation: self.evaluations.get_evaluation(question_id).cloned(),
            refinement_fields: self.refinement.fields(question_id).cloned(),
            iteration: self.refinement.iteration(question_id),
            experience_level: self.flows.level_of(question_id),
            pending,
            adaptive: self.adaptive.get(question_id).cloned(),
        }
    }
}

fn lock(context: &Mutex<WorkflowContext>) -> MutexGuard<'_, WorkflowContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claim on a question id for the duration of one backend call.
struct PendingGuard<'a> {
    context: &'a Mutex<WorkflowContext>,
    question_id: String,
    epoch: u64,
    released: bool,
}

impl PendingGuard<'_> {
    fn release(mut self, ctx: &mut WorkflowContext) {
        ctx.release(&self.question_id, self.epoch);
        self.released = true;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Backend call for question {} abandoned; releasing claim",
                self.question_id
            );
            lock(self.context).release(&self.question_id, self.epoch);
        }
    }
}

fn ensure_epoch(ctx: &WorkflowContext, epoch: u64) -> Result<(), AppError> {
    if ctx.epoch == epoch {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(
            "workflow was reset while the request was in flight".to_string(),
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct WorkflowOrchestrator {
    context: Mutex<WorkflowContext>,
    backend: Arc<dyn AdaptiveBackend>,
    language: String,
}

impl WorkflowOrchestrator {
    pub fn new(backend: Arc<dyn AdaptiveBackend>, language: impl Into<String>) -> Self {
        Self {
            context: Mutex::new(WorkflowContext::default()),
            backend,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowContext> {
        lock(&self.context)
    }

    fn claim(
        &self,
        ctx: &mut WorkflowContext,
        question_id: &str,
        operation: PendingOperation,
    ) -> Result<PendingGuard<'_>, AppError> {
        let epoch = ctx.claim(question_id, operation)?;
        Ok(PendingGuard {
            context: &self.context,
            question_id: question_id.to_string(),
            epoch,
            released: false,
        })
    }

    /// Relocks after a backend call, releasing the claim and rejecting
    /// results that outlived a reset.
    fn settle(&self, guard: PendingGuard<'_>) -> Result<MutexGuard<'_, WorkflowContext>, AppError> {
        let mut ctx = self.lock();
        let epoch = guard.epoch;
        guard.release(&mut ctx);
        ensure_epoch(&ctx, epoch)?;
        Ok(ctx)
    }

    // ── Plain answers ───────────────────────────────────────────────────────

    /// Stores a typed or transcribed answer and queues it for evaluation.
    /// Abandons the deep-dive branch if the user was in one.
    pub fn submit_answer(
        &self,
        question_id: &str,
        text: &str,
        input_mode: InputMode,
        transcription_time: Option<f64>,
    ) -> Result<Answer, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("answer text cannot be empty".to_string()));
        }

        let mut ctx = self.lock();
        ctx.ensure_idle(question_id)?;
        let stage = ctx.require_stage(question_id, "answer", |stage| {
            matches!(
                stage,
                QuestionStage::Unstarted
                    | QuestionStage::AwaitingEvaluation
                    | QuestionStage::NeedsRefinement
                    | QuestionStage::DeepDivePrompts
            )
        })?;

        let answer = ctx
            .answers
            .set_answer(question_id, text, input_mode, transcription_time)?
            .clone();
        if stage == QuestionStage::DeepDivePrompts {
            ctx.leave_flow(question_id);
        }
        ctx.unevaluated_refinements.remove(question_id);
        ctx.set_stage(question_id, QuestionStage::AwaitingEvaluation);
        info!(
            "Answer stored for question {} ({:?}, {} chars)",
            question_id,
            input_mode,
            text.len()
        );
        Ok(answer)
    }

    // ── Adaptive branch ─────────────────────────────────────────────────────

    /// Records the experience check. `NoExperience` ends the question with
    /// no backend call; every other level starts an adaptive flow.
    pub async fn choose_experience(
        &self,
        question: &Question,
        level: ExperienceLevel,
        context: AdaptiveContext,
    ) -> Result<QuestionSnapshot, AppError> {
        let question_id = question.id.as_str();
        let allowed = |stage: QuestionStage| {
            matches!(
                stage,
                QuestionStage::Unstarted
                    | QuestionStage::DeepDivePrompts
                    | QuestionStage::LearningResources
            )
        };

        if level.path() == AdaptivePath::NoExperience {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            ctx.require_stage(question_id, "record experience for", allowed)?;
            ctx.leave_flow(question_id);
            ctx.set_stage(question_id, QuestionStage::NoExperience);
            ctx.ui.close_adaptive_modal_for(question_id);
            info!("Question {} marked as no experience", question_id);
            return Ok(ctx.snapshot(question_id));
        }

        let (request, guard) = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            ctx.require_stage(question_id, "record experience for", allowed)?;
            let request = StartAdaptiveRequest {
                question_id: question_id.to_string(),
                question_text: question.question_text.clone(),
                question_data: question.clone(),
                gap_info: question.gap_info(),
                user_id: context.user_id,
                parsed_cv: context.parsed_cv,
                parsed_jd: context.parsed_jd,
                experience_check_response: level.backend_response().to_string(),
                language: self.language.clone(),
            };
            let guard = self.claim(&mut ctx, question_id, PendingOperation::StartingFlow)?;
            (request, guard)
        };

        let result = self.backend.start_adaptive(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result.map_err(|e| {
            warn!("Starting adaptive flow for {} failed: {}", question_id, e);
            e
        })?;

        let (stage, output) = match level.path() {
            AdaptivePath::DeepDive => {
                if response.deep_dive_prompts.is_empty() {
                    warn!("Backend returned no deep-dive prompts for {}", question_id);
                }
                let output = AdaptiveOutput {
                    deep_dive_prompts: response.deep_dive_prompts,
                    ..AdaptiveOutput::default()
                };
                (QuestionStage::DeepDivePrompts, output)
            }
            _ => {
                let output = AdaptiveOutput {
                    learning_resources: response.suggested_resources,
                    ..AdaptiveOutput::default()
                };
                (QuestionStage::LearningResources, output)
            }
        };

        ctx.flows.start(question_id, level);
        ctx.adaptive.insert(question_id.to_string(), output);
        ctx.set_stage(question_id, stage);
        ctx.ui.close_adaptive_modal_for(question_id);
        info!(
            "Adaptive flow started for question {} ({:?}, backend step {})",
            question_id, level, response.current_step
        );
        Ok(ctx.snapshot(question_id))
    }

    /// Sends the deep-dive answers; the generated answer becomes the
    /// question's answer and awaits evaluation.
    pub async fn submit_structured_inputs(
        &self,
        question_id: &str,
        fields: RefinementFields,
    ) -> Result<Answer, AppError> {
        if fields.values().all(|value| value.trim().is_empty()) {
            return Err(AppError::Validation(
                "at least one deep-dive input is required".to_string(),
            ));
        }

        let guard = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            ctx.require_stage(question_id, "submit deep-dive inputs for", |stage| {
                stage == QuestionStage::DeepDivePrompts
            })?;
            self.claim(&mut ctx, question_id, PendingOperation::SubmittingInputs)?
        };

        let request = SubmitInputsRequest {
            question_id: question_id.to_string(),
            structured_data: fields,
        };
        let result = self.backend.submit_structured_inputs(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result?;

        if let Some(score) = response.quality_score {
            debug!("Preliminary score {} for question {}", score, question_id);
        }
        let answer = ctx
            .answers
            .set_answer(question_id, response.generated_answer, InputMode::Text, None)?
            .clone();
        if let Some(output) = ctx.adaptive.get_mut(question_id) {
            output.deep_dive_prompts.clear();
        }
        ctx.set_stage(question_id, QuestionStage::AwaitingEvaluation);
        info!("Generated answer stored for question {}", question_id);
        Ok(answer)
    }

    // ── Evaluation and refinement ───────────────────────────────────────────

    fn prepare_evaluation(
        &self,
        ctx: &WorkflowContext,
        question: &Question,
    ) -> Result<EvaluateAnswerRequest, AppError> {
        ctx.require_stage(&question.id, "evaluate", |stage| {
            stage == QuestionStage::AwaitingEvaluation
        })?;
        let answer = ctx.answers.get_answer(&question.id).ok_or_else(|| {
            AppError::InvalidTransition(format!("question {} has no answer", question.id))
        })?;
        Ok(EvaluateAnswerRequest {
            question_id: question.id.clone(),
            question_text: question.question_text.clone(),
            answer_text: answer.text.clone(),
            gap_info: question.gap_info(),
            language: self.language.clone(),
        })
    }

    /// Scores the current answer and applies the acceptance policy.
    /// On failure nothing is recorded and the question keeps its stage.
    pub async fn evaluate_answer(&self, question: &Question) -> Result<Evaluation, AppError> {
        let question_id = question.id.as_str();
        let (request, guard) = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            let request = self.prepare_evaluation(&ctx, question)?;
            let guard = self.claim(&mut ctx, question_id, PendingOperation::Evaluating)?;
            ctx.evaluations.start_evaluating(question_id);
            (request, guard)
        };

        info!("Evaluating answer for question {}", question_id);
        let answer_text = request.answer_text.clone();
        let result = self.backend.evaluate_answer(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result.map_err(|e| {
            warn!("Evaluation of question {} failed: {}", question_id, e);
            e
        })?;
        Ok(ctx.apply_evaluation(question_id, answer_text, response))
    }

    pub fn update_refinement_field(
        &self,
        question_id: &str,
        key: &str,
        value: &str,
    ) -> Result<RefinementFields, AppError> {
        if key.trim().is_empty() {
            return Err(AppError::Validation("refinement field key cannot be empty".to_string()));
        }
        let mut ctx = self.lock();
        ctx.require_stage(question_id, "edit refinement details for", |stage| {
            !stage.is_terminal()
        })?;
        ctx.refinement.update_field(question_id, key, value);
        Ok(ctx.refinement.fields(question_id).cloned().unwrap_or_default())
    }

    /// Merges `fields` into the question's refinement details.
    pub fn set_refinement_fields(
        &self,
        question_id: &str,
        fields: RefinementFields,
    ) -> Result<RefinementFields, AppError> {
        if fields.keys().any(|key| key.trim().is_empty()) {
            return Err(AppError::Validation("refinement field key cannot be empty".to_string()));
        }
        let mut ctx = self.lock();
        ctx.require_stage(question_id, "edit refinement details for", |stage| {
            !stage.is_terminal()
        })?;
        ctx.refinement.set_fields(question_id, fields);
        Ok(ctx.refinement.fields(question_id).cloned().unwrap_or_default())
    }

    fn prepare_refinement(
        &self,
        ctx: &WorkflowContext,
        question: &Question,
    ) -> Result<RefineAnswerRequest, AppError> {
        let question_id = question.id.as_str();
        ctx.require_stage(question_id, "refine", |stage| {
            stage == QuestionStage::NeedsRefinement
        })?;
        if !ctx.refinement.has_content(question_id) {
            return Err(AppError::Validation(
                "fill in at least one refinement detail before refining".to_string(),
            ));
        }
        let answer = ctx.answers.get_answer(question_id).ok_or_else(|| {
            AppError::InvalidTransition(format!("question {question_id} has no answer"))
        })?;
        let quality_issues = ctx
            .evaluations
            .get_evaluation(question_id)
            .map(Evaluation::issue_summaries)
            .unwrap_or_default();

        Ok(RefineAnswerRequest {
            question_id: question_id.to_string(),
            question_text: question.question_text.clone(),
            question_data: question.clone(),
            gap_info: question.gap_info(),
            generated_answer: answer.text.clone(),
            quality_issues,
            additional_data: ctx.refinement.filled_fields(question_id),
        })
    }

    /// Rewrites the answer using the refinement details. The result still
    /// has to go through `evaluate_answer`.
    pub async fn refine_answer(&self, question: &Question) -> Result<Answer, AppError> {
        let question_id = question.id.as_str();
        let (request, guard) = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            let request = self.prepare_refinement(&ctx, question)?;
            let guard = self.claim(&mut ctx, question_id, PendingOperation::Refining)?;
            (request, guard)
        };

        info!("Refining answer for question {}", question_id);
        let result = self.backend.refine_answer(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result.map_err(|e| {
            warn!("Refinement of question {} failed: {}", question_id, e);
            e
        })?;
        ctx.apply_refinement(question_id, response)
    }

    /// Refine then evaluate under a single claim, so nothing else can slip
    /// in between the two calls for this question. When an earlier call
    /// refined the answer but its evaluation failed, only the evaluation
    /// runs again.
    pub async fn refine_and_reevaluate(&self, question: &Question) -> Result<Evaluation, AppError> {
        let question_id = question.id.as_str();
        let (refine_request, guard) = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            let resuming = ctx.stage(question_id) == QuestionStage::AwaitingEvaluation
                && ctx.unevaluated_refinements.contains(question_id);
            if resuming {
                let guard = self.claim(&mut ctx, question_id, PendingOperation::Evaluating)?;
                (None, guard)
            } else {
                let request = self.prepare_refinement(&ctx, question)?;
                let guard = self.claim(&mut ctx, question_id, PendingOperation::Refining)?;
                (Some(request), guard)
            }
        };

        match refine_request {
            Some(request) => {
                info!("Refining and re-evaluating question {}", question_id);
                let refined = self.backend.refine_answer(request).await;
                let mut ctx = self.lock();
                ensure_epoch(&ctx, guard.epoch)?;
                let response = refined.map_err(|e| {
                    warn!("Refinement of question {} failed: {}", question_id, e);
                    e
                })?;
                ctx.apply_refinement(question_id, response)?;
            }
            None => info!(
                "Re-evaluating refined answer for question {} after a failed evaluation",
                question_id
            ),
        }

        let request = {
            let mut ctx = self.lock();
            ensure_epoch(&ctx, guard.epoch)?;
            let request = self.prepare_evaluation(&ctx, question)?;
            ctx.retag(question_id, PendingOperation::Evaluating);
            ctx.evaluations.start_evaluating(question_id);
            request
        };

        let answer_text = request.answer_text.clone();
        let result = self.backend.evaluate_answer(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result.map_err(|e| {
            warn!("Evaluation of question {} failed: {}", question_id, e);
            e
        })?;
        Ok(ctx.apply_evaluation(question_id, answer_text, response))
    }

    /// User-forced acceptance while refinement is requested. Accepting an
    /// already accepted question is a no-op.
    pub fn accept_anyway(&self, question_id: &str) -> Result<QuestionSnapshot, AppError> {
        let mut ctx = self.lock();
        ctx.ensure_idle(question_id)?;
        let stage = ctx.require_stage(question_id, "accept", |stage| {
            matches!(
                stage,
                QuestionStage::NeedsRefinement | QuestionStage::Accepted { .. }
            )
        })?;
        if stage == QuestionStage::NeedsRefinement {
            ctx.finalize(question_id, AcceptanceReason::UserForced);
        }
        Ok(ctx.snapshot(question_id))
    }

    // ── Learning branch ─────────────────────────────────────────────────────

    pub async fn fetch_learning_resources(
        &self,
        question: &Question,
        preferences: LearningPreferences,
    ) -> Result<LearningResourcesResponse, AppError> {
        if preferences.limit == 0 || preferences.max_days == 0 {
            return Err(AppError::Validation(
                "limit and max_days must be positive".to_string(),
            ));
        }
        let question_id = question.id.as_str();

        let guard = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            ctx.require_stage(question_id, "fetch learning resources for", |stage| {
                stage == QuestionStage::LearningResources
            })?;
            self.claim(&mut ctx, question_id, PendingOperation::FetchingResources)?
        };

        let request = LearningResourcesRequest {
            gap: question.gap_info(),
            preferences,
        };
        let result = self.backend.get_learning_resources(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result?;

        let output = ctx.adaptive.entry(question_id.to_string()).or_default();
        output.learning_resources = response.resources.clone();
        output.learning_path = Some(response.learning_path.clone());
        info!(
            "Fetched {} learning resources for question {} ({} days)",
            response.resources.len(),
            question_id,
            response.learning_path.total_days
        );
        Ok(response)
    }

    /// Saves the chosen resources as a plan and completes the learning flow.
    /// No answer is recorded for the question.
    pub async fn save_learning_plan(
        &self,
        question: &Question,
        user_id: &str,
        resource_ids: Vec<String>,
        notes: Option<String>,
    ) -> Result<SaveLearningPlanResponse, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user_id cannot be empty".to_string()));
        }
        if resource_ids.is_empty() {
            return Err(AppError::Validation(
                "select at least one learning resource".to_string(),
            ));
        }
        let question_id = question.id.as_str();

        let guard = {
            let mut ctx = self.lock();
            ctx.ensure_idle(question_id)?;
            ctx.require_stage(question_id, "save a learning plan for", |stage| {
                stage == QuestionStage::LearningResources
            })?;
            self.claim(&mut ctx, question_id, PendingOperation::SavingPlan)?
        };

        let request = SaveLearningPlanRequest {
            user_id: user_id.to_string(),
            gap: question.gap_info(),
            resource_ids,
            notes,
        };
        let result = self.backend.save_learning_plan(request).await;
        let mut ctx = self.settle(guard)?;
        let response = result?;

        ctx.flows.complete(question_id);
        ctx.adaptive
            .entry(question_id.to_string())
            .or_default()
            .plan_id = Some(response.plan_id.clone());
        ctx.set_stage(question_id, QuestionStage::FlowComplete);
        info!(
            "Learning plan {} saved for question {}",
            response.plan_id, question_id
        );
        Ok(response)
    }

    /// Completes the learning flow without saving a plan.
    pub fn finish_learning_flow(&self, question_id: &str) -> Result<QuestionSnapshot, AppError> {
        let mut ctx = self.lock();
        ctx.ensure_idle(question_id)?;
        let stage = ctx.require_stage(question_id, "finish the learning flow for", |stage| {
            matches!(
                stage,
                QuestionStage::LearningResources | QuestionStage::FlowComplete
            )
        })?;
        if stage == QuestionStage::LearningResources {
            ctx.flows.complete(question_id);
            ctx.set_stage(question_id, QuestionStage::FlowComplete);
            info!("Learning flow finished for question {}", question_id);
        }
        Ok(ctx.snapshot(question_id))
    }

    /// Lists saved plans. Touches no workflow state.
    pub async fn learning_plans(
        &self,
        user_id: &str,
        status: Option<PlanStatus>,
    ) -> Result<LearningPlansResponse, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user_id cannot be empty".to_string()));
        }
        let request = LearningPlansRequest {
            user_id: user_id.to_string(),
            status,
        };
        Ok(self.backend.get_learning_plans(request).await?)
    }

    // ── Housekeeping ────────────────────────────────────────────────────────

    /// Backs out of the adaptive branch to the experience check.
    pub fn cancel_adaptive_flow(&self, question_id: &str) -> Result<QuestionSnapshot, AppError> {
        let mut ctx = self.lock();
        ctx.ensure_idle(question_id)?;
        ctx.require_stage(question_id, "cancel the adaptive flow of", |stage| {
            stage.is_adaptive()
        })?;
        ctx.leave_flow(question_id);
        ctx.set_stage(question_id, QuestionStage::Unstarted);
        ctx.ui.close_adaptive_modal_for(question_id);
        info!("Adaptive flow cancelled for question {}", question_id);
        Ok(ctx.snapshot(question_id))
    }

    /// Forgets everything about one question.
    pub fn clear_question(&self, question_id: &str) -> Result<(), AppError> {
        let mut ctx = self.lock();
        ctx.ensure_idle(question_id)?;
        ctx.answers.clear(question_id);
        ctx.evaluations.clear(question_id);
        ctx.refinement.clear(question_id);
        ctx.unevaluated_refinements.remove(question_id);
        ctx.leave_flow(question_id);
        ctx.stages.remove(question_id);
        ctx.ui.forget(question_id);
        info!("Question {} cleared", question_id);
        Ok(())
    }

    /// Drops all workflow state. Calls still in flight settle into nothing.
    pub fn reset(&self) {
        let mut ctx = self.lock();
        let epoch = ctx.epoch + 1;
        let in_flight = ctx.pending.len();
        *ctx = WorkflowContext {
            epoch,
            ..WorkflowContext::default()
        };
        info!(
            "Workflow reset (epoch {}, {} call(s) abandoned)",
            epoch, in_flight
        );
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn snapshot(&self, question_id: &str) -> QuestionSnapshot {
        self.lock().snapshot(question_id)
    }

    /// Answers of accepted questions, ordered by question id.
    pub fn accepted_answers(&self) -> Vec<Answer> {
        let ctx = self.lock();
        let mut answers: Vec<Answer> = ctx
            .answers
            .iter()
            .filter(|answer| {
                matches!(
                    ctx.stage(&answer.question_id),
                    QuestionStage::Accepted { .. }
                )
            })
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        answers
    }

    pub fn all_answered(&self, expected_count: usize) -> bool {
        self.lock().answers.all_answered(expected_count)
    }

    pub fn evaluating_question(&self) -> Option<String> {
        self.lock().evaluations.evaluating().map(str::to_string)
    }

    pub fn summary(&self) -> WorkflowSummary {
        let ctx = self.lock();
        WorkflowSummary {
            answered: ctx.answers.len(),
            accepted: ctx
                .stages
                .values()
                .filter(|stage| matches!(stage, QuestionStage::Accepted { .. }))
                .count(),
            active_flows: ctx.flows.active_count(),
            evaluating: ctx.evaluations.evaluating().map(str::to_string),
        }
    }

    pub fn ui_state(&self) -> UiState {
        self.lock().ui.clone()
    }

    pub fn apply_ui(&self, command: UiCommand) -> UiState {
        let mut ctx = self.lock();
        ctx.ui.apply(command);
        ctx.ui.clone()
    }
}
