use serde::{Deserialize, Serialize};

/// Priority assigned to a question by the question generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
}

/// The skill gap a question is trying to close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapInfo {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

/// A generated gap-filling question. Owned by the analysis state; the
/// workflow only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    pub question_text: String,
    /// Why the job description makes this gap matter.
    #[serde(default)]
    pub context_why: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_length: Option<String>,
}

impl Question {
    /// Gap descriptor sent alongside every backend call about this question.
    pub fn gap_info(&self) -> GapInfo {
        GapInfo {
            title: self.title.clone(),
            description: self.context_why.clone(),
            category: self.category.clone(),
            impact: if self.impact.is_empty() {
                None
            } else {
                Some(self.impact.clone())
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        number: 1,
        title: "AI/Chatbot Development".to_string(),
        priority: Priority::Critical,
        question_text: "Describe a chatbot project you built".to_string(),
        context_why: "Missing experience in AI chatbots".to_string(),
        impact: "High".to_string(),
        category: Some("technical".to_string()),
        examples: vec!["Built a support bot handling 2k requests/day".to_string()],
        expected_length: Some("3-5 sentences".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_deserializes_generator_payload() {
        let json = r#"{
            "id": "q1",
            "number": 1,
            "title": "Kubernetes",
            "priority": "CRITICAL",
            "impact": "+12% match",
            "question_text": "Have you deployed services on Kubernetes?",
            "context_why": "The role runs everything on EKS",
            "examples": ["Migrated 40 services to EKS"]
        }"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.priority, Priority::Critical);
        assert_eq!(question.examples.len(), 1);
        assert!(question.category.is_none());
    }

    #[test]
    fn test_priority_defaults_to_medium_when_missing() {
        let json = r#"{"id": "q2", "title": "SQL", "question_text": "Describe a schema you designed"}"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.priority, Priority::Medium);
        assert!(question.context_why.is_empty());
    }

    #[test]
    fn test_gap_info_uses_context_as_description() {
        let gap = sample_question("q1").gap_info();
        assert_eq!(gap.title, "AI/Chatbot Development");
        assert_eq!(gap.description, "Missing experience in AI chatbots");
        assert_eq!(gap.impact.as_deref(), Some("High"));
    }

    #[test]
    fn test_gap_info_omits_empty_impact() {
        let mut question = sample_question("q1");
        question.impact.clear();
        let value = serde_json::to_value(question.gap_info()).unwrap();
        assert!(value.get("impact").is_none());
    }
}
