use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::workflow::refinement::RefinementTracker;

/// One piece of evaluator feedback. The backend sends either plain strings
/// or `{issue, suggestion, priority}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackItem {
    Text(String),
    Detailed {
        issue: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<String>,
    },
}

impl FeedbackItem {
    pub fn summary(&self) -> String {
        match self {
            FeedbackItem::Text(text) => text.clone(),
            FeedbackItem::Detailed {
                issue,
                suggestion: Some(suggestion),
                ..
            } => format!("{issue} ({suggestion})"),
            FeedbackItem::Detailed { issue, .. } => issue.clone(),
        }
    }
}

/// Latest quality evaluation of a question's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub question_id: String,
    /// The answer text that was scored.
    pub answer_text: String,
    pub quality_score: f64,
    pub quality_issues: Vec<FeedbackItem>,
    pub quality_strengths: Vec<FeedbackItem>,
    pub improvement_suggestions: Vec<FeedbackItem>,
    /// Policy verdict, including the iteration-cap override.
    pub is_acceptable: bool,
    #[serde(rename = "time_seconds")]
    pub latency_seconds: f64,
    pub model: String,
}

impl Evaluation {
    pub fn issue_summaries(&self) -> Vec<String> {
        self.quality_issues.iter().map(FeedbackItem::summary).collect()
    }
}

/// Latest evaluation per question, plus the cosmetic "currently evaluating"
/// pointer used to pick which spinner to show.
#[derive(Debug, Default)]
pub struct EvaluationStore {
    evaluations: HashMap<String, Evaluation>,
    evaluating: Option<String>,
}

impl EvaluationStore {
    /// Records `evaluation`, replacing any previous one, and clears the
    /// evaluating pointer.
    ///
    /// Side effect: an unacceptable evaluation seeds refinement fields in
    /// `refinement` for the question, unless fields already exist. Returns
    /// whether seeding happened.
    pub fn set_evaluation(
        &mut self,
        evaluation: Evaluation,
        refinement: &mut RefinementTracker,
    ) -> bool {
        let question_id = evaluation.question_id.clone();
        let seeded = !evaluation.is_acceptable && refinement.seed(&question_id);
        self.evaluations.insert(question_id, evaluation);
        self.evaluating = None;
        seeded
    }

    pub fn get_evaluation(&self, question_id: &str) -> Option<&Evaluation> {
        self.evaluations.get(question_id)
    }

    pub fn start_evaluating(&mut self, question_id: &str) {
        self.evaluating = Some(question_id.to_string());
    }

    pub fn clear_evaluating(&mut self) {
        self.evaluating = None;
    }

    pub fn evaluating(&self) -> Option<&str> {
        self.evaluating.as_deref()
    }

    pub fn clear(&mut self, question_id: &str) {
        self.evaluations.remove(question_id);
    }

    pub fn clear_all(&mut self) {
        self.evaluations.clear();
        self.evaluating = None;
    }
}

#[cfg(test)]
pub(crate) fn sample_evaluation(question_id: &str, score: f64, is_acceptable: bool) -> Evaluation {
    Evaluation {
        question_id: question_id.to_string(),
        answer_text: "I built a chatbot".to_string(),
        quality_score: score,
        quality_issues: vec![FeedbackItem::Text("Too vague".to_string())],
        quality_strengths: vec![],
        improvement_suggestions: vec![FeedbackItem::Text("Add metrics".to_string())],
        is_acceptable,
        latency_seconds: 1.5,
        model: "gemini-2.0-flash".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::refinement::FIELD_METRICS;

    #[test]
    fn test_unacceptable_evaluation_seeds_refinement() {
        let mut store = EvaluationStore::default();
        let mut refinement = RefinementTracker::default();

        let seeded = store.set_evaluation(sample_evaluation("q1", 4.0, false), &mut refinement);

        assert!(seeded);
        assert_eq!(refinement.fields("q1").unwrap().len(), 3);
        assert_eq!(store.get_evaluation("q1").unwrap().quality_score, 4.0);
    }

    #[test]
    fn test_acceptable_evaluation_does_not_seed() {
        let mut store = EvaluationStore::default();
        let mut refinement = RefinementTracker::default();

        let seeded = store.set_evaluation(sample_evaluation("q1", 8.0, true), &mut refinement);

        assert!(!seeded);
        assert!(refinement.fields("q1").is_none());
    }

    #[test]
    fn test_repeated_unacceptable_evaluations_keep_user_fields() {
        let mut store = EvaluationStore::default();
        let mut refinement = RefinementTracker::default();

        store.set_evaluation(sample_evaluation("q1", 4.0, false), &mut refinement);
        refinement.update_field("q1", FIELD_METRICS, "50 users, 87%");
        let seeded = store.set_evaluation(sample_evaluation("q1", 5.0, false), &mut refinement);

        assert!(!seeded);
        assert_eq!(refinement.fields("q1").unwrap()[FIELD_METRICS], "50 users, 87%");
        assert_eq!(store.get_evaluation("q1").unwrap().quality_score, 5.0);
    }

    #[test]
    fn test_set_evaluation_clears_evaluating_pointer() {
        let mut store = EvaluationStore::default();
        let mut refinement = RefinementTracker::default();

        store.start_evaluating("q1");
        assert_eq!(store.evaluating(), Some("q1"));

        store.set_evaluation(sample_evaluation("q1", 8.0, true), &mut refinement);
        assert_eq!(store.evaluating(), None);
    }

    #[test]
    fn test_evaluating_pointer_is_single_valued() {
        let mut store = EvaluationStore::default();
        store.start_evaluating("q1");
        store.start_evaluating("q2");
        assert_eq!(store.evaluating(), Some("q2"));
        store.clear_evaluating();
        assert_eq!(store.evaluating(), None);
    }

    #[test]
    fn test_feedback_accepts_strings_and_objects() {
        let json = r#"["Too vague", {"issue": "No metrics", "suggestion": "Add numbers", "priority": "high"}]"#;
        let items: Vec<FeedbackItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items[0].summary(), "Too vague");
        assert_eq!(items[1].summary(), "No metrics (Add numbers)");
    }
}
