use std::collections::{BTreeMap, HashMap};

use crate::workflow::policy::MAX_REFINEMENT_ITERATIONS;

/// How long the user worked with the skill.
pub const FIELD_DURATION_DETAIL: &str = "duration_detail";
/// Tools, frameworks or technologies involved.
pub const FIELD_SPECIFIC_TOOLS: &str = "specific_tools";
/// Quantifiable results.
pub const FIELD_METRICS: &str = "metrics";

pub const REFINEMENT_FIELDS: [&str; 3] = [FIELD_DURATION_DETAIL, FIELD_SPECIFIC_TOOLS, FIELD_METRICS];

pub type RefinementFields = BTreeMap<String, String>;

/// Follow-up detail the user is collecting for questions whose answer was
/// judged too weak, plus how many refinement cycles each has used.
#[derive(Debug, Default)]
pub struct RefinementTracker {
    fields: HashMap<String, RefinementFields>,
    iterations: HashMap<String, u32>,
}

impl RefinementTracker {
    /// Adds whichever schema fields `question_id` is missing, as empty
    /// strings. Existing values are kept. Returns whether it added any.
    pub fn seed(&mut self, question_id: &str) -> bool {
        let fields = self.fields.entry(question_id.to_string()).or_default();
        let before = fields.len();
        for key in REFINEMENT_FIELDS {
            fields.entry(key.to_string()).or_default();
        }
        fields.len() > before
    }

    /// Merges `fields` into the existing map, creating it if absent.
    pub fn set_fields(&mut self, question_id: &str, fields: RefinementFields) {
        self.fields
            .entry(question_id.to_string())
            .or_default()
            .extend(fields);
    }

    pub fn update_field(&mut self, question_id: &str, key: &str, value: impl Into<String>) {
        self.fields
            .entry(question_id.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn fields(&self, question_id: &str) -> Option<&RefinementFields> {
        self.fields.get(question_id)
    }

    pub fn has_content(&self, question_id: &str) -> bool {
        self.fields
            .get(question_id)
            .map(|fields| fields.values().any(|v| !v.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Non-blank fields only, as sent to the refine call.
    pub fn filled_fields(&self, question_id: &str) -> RefinementFields {
        self.fields
            .get(question_id)
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(_, v)| !v.trim().is_empty())
                    .map(|(k, v)| (k.clone(), v.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Saturates at `MAX_REFINEMENT_ITERATIONS`.
    pub fn increment_iteration(&mut self, question_id: &str) -> u32 {
        let count = self.iterations.entry(question_id.to_string()).or_insert(0);
        *count = (*count + 1).min(MAX_REFINEMENT_ITERATIONS);
        *count
    }

    pub fn iteration(&self, question_id: &str) -> u32 {
        self.iterations.get(question_id).copied().unwrap_or(0)
    }

    /// Drops the fields and resets the iteration count. Safe to call when
    /// nothing is tracked for the question.
    pub fn accept(&mut self, question_id: &str) {
        self.fields.remove(question_id);
        self.iterations.remove(question_id);
    }

    pub fn clear(&mut self, question_id: &str) {
        self.fields.remove(question_id);
        self.iterations.remove(question_id);
    }

    pub fn clear_all(&mut self) {
        self.fields.clear();
        self.iterations.clear();
    }
}
