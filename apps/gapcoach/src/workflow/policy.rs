//! Acceptance policy for evaluated answers.
//!
//! An answer is accepted when its score reaches `ACCEPTABLE_THRESHOLD`, or
//! when the question already used `MAX_REFINEMENT_ITERATIONS` refinement
//! cycles. The second rule guarantees every refinement loop terminates.

use tracing::warn;

use crate::workflow::stage::AcceptanceReason;

/// Minimum quality score (0–10) for an answer to be used as-is.
pub const ACCEPTABLE_THRESHOLD: f64 = 7.0;
/// Scores at or above this are shown as excellent.
pub const EXCELLENT_THRESHOLD: f64 = 8.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// Refinement cycles allowed per question before acceptance is forced.
pub const MAX_REFINEMENT_ITERATIONS: u32 = 2;

/// Outcome of applying the policy to one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted(AcceptanceReason),
    NeedsRefinement,
}

impl Verdict {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// Clamps a backend score into the 0–10 range. Non-finite scores count as 0.
pub fn normalize_score(score: f64) -> f64 {
    if !score.is_finite() {
        warn!("Backend returned a non-finite quality score; treating as {MIN_SCORE}");
        return MIN_SCORE;
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        warn!("Quality score {score} outside {MIN_SCORE}-{MAX_SCORE}; clamping");
    }
    score.clamp(MIN_SCORE, MAX_SCORE)
}

pub fn meets_threshold(score: f64) -> bool {
    normalize_score(score) >= ACCEPTABLE_THRESHOLD
}

/// `iteration` is the number of refinement cycles already completed.
pub fn judge(score: f64, iteration: u32) -> Verdict {
    if meets_threshold(score) {
        Verdict::Accepted(AcceptanceReason::Quality)
    } else if iteration >= MAX_REFINEMENT_ITERATIONS {
        Verdict::Accepted(AcceptanceReason::IterationCap)
    } else {
        Verdict::NeedsRefinement
    }
}
