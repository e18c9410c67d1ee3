use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Text,
    Voice,
}

/// The current answer for one question. Resubmission replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    #[serde(rename = "answer_text")]
    pub text: String,
    #[serde(rename = "answer_type")]
    pub input_mode: InputMode,
    /// Seconds spent transcribing, voice answers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription_time: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One answer per question id.
#[derive(Debug, Default)]
pub struct AnswerStore {
    answers: HashMap<String, Answer>,
}

impl AnswerStore {
    /// Inserts or overwrites the answer for `question_id`, stamping the current time.
    pub fn set_answer(
        &mut self,
        question_id: &str,
        text: impl Into<String>,
        input_mode: InputMode,
        transcription_time: Option<f64>,
    ) -> Result<&Answer, AppError> {
        if question_id.trim().is_empty() {
            return Err(AppError::Validation(
                "question_id cannot be empty".to_string(),
            ));
        }

        let answer = Answer {
            question_id: question_id.to_string(),
            text: text.into(),
            input_mode,
            transcription_time,
            timestamp: Utc::now(),
        };
        self.answers.insert(question_id.to_string(), answer);
        Ok(&self.answers[question_id])
    }

    pub fn get_answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    /// The store does not know the question set; the caller supplies the total.
    pub fn all_answered(&self, expected_count: usize) -> bool {
        self.answers.len() == expected_count
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.answers.values()
    }

    pub fn clear(&mut self, question_id: &str) {
        self.answers.remove(question_id);
    }

    pub fn clear_all(&mut self) {
        self.answers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_answer_then_get() {
        let mut store = AnswerStore::default();
        store
            .set_answer("q1", "I have 5 years experience", InputMode::Text, None)
            .unwrap();

        let answer = store.get_answer("q1").unwrap();
        assert_eq!(answer.text, "I have 5 years experience");
        assert_eq!(answer.input_mode, InputMode::Text);
        assert!(store.is_answered("q1"));
        assert!(!store.is_answered("q2"));
    }

    #[test]
    fn test_resubmission_overwrites_without_history() {
        let mut store = AnswerStore::default();
        store.set_answer("q1", "first", InputMode::Text, None).unwrap();
        store
            .set_answer("q1", "second", InputMode::Voice, Some(1.5))
            .unwrap();

        assert_eq!(store.len(), 1);
        let answer = store.get_answer("q1").unwrap();
        assert_eq!(answer.text, "second");
        assert_eq!(answer.input_mode, InputMode::Voice);
        assert_eq!(answer.transcription_time, Some(1.5));
    }

    #[test]
    fn test_empty_question_id_is_rejected() {
        let mut store = AnswerStore::default();
        let err = store.set_answer("  ", "text", InputMode::Text, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_all_answered_compares_against_expected_count() {
        let mut store = AnswerStore::default();
        store.set_answer("q1", "a", InputMode::Text, None).unwrap();
        store.set_answer("q2", "b", InputMode::Text, None).unwrap();

        assert!(store.all_answered(2));
        assert!(!store.all_answered(3));
    }

    #[test]
    fn test_clear_and_clear_all() {
        let mut store = AnswerStore::default();
        store.set_answer("q1", "a", InputMode::Text, None).unwrap();
        store.set_answer("q2", "b", InputMode::Text, None).unwrap();

        store.clear("q1");
        assert!(!store.is_answered("q1"));
        assert!(store.is_answered("q2"));

        store.clear_all();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_answer_serializes_with_wire_names() {
        let mut store = AnswerStore::default();
        let answer = store
            .set_answer("q1", "spoken", InputMode::Voice, Some(2.0))
            .unwrap()
            .clone();
        let value = serde_json::to_value(&answer).unwrap();
        assert_eq!(value["answer_text"], "spoken");
        assert_eq!(value["answer_type"], "voice");
    }
}
