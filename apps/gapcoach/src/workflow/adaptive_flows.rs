use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Answer to the experience check shown before the adaptive branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    ConfirmedExperience,
    SomeExperience,
    WillingToLearn,
    NoExperience,
}

/// Branch of the adaptive workflow an experience level leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptivePath {
    DeepDive,
    LearningResources,
    NoExperience,
}

impl ExperienceLevel {
    pub fn path(&self) -> AdaptivePath {
        match self {
            ExperienceLevel::ConfirmedExperience | ExperienceLevel::SomeExperience => {
                AdaptivePath::DeepDive
            }
            ExperienceLevel::WillingToLearn => AdaptivePath::LearningResources,
            ExperienceLevel::NoExperience => AdaptivePath::NoExperience,
        }
    }

    /// Value the backend expects in `experience_check_response`.
    pub fn backend_response(&self) -> &'static str {
        match self {
            ExperienceLevel::ConfirmedExperience | ExperienceLevel::SomeExperience => "yes",
            ExperienceLevel::WillingToLearn => "willing_to_learn",
            ExperienceLevel::NoExperience => "no",
        }
    }
}

/// Questions currently inside the adaptive branch, with the level chosen.
#[derive(Debug, Default)]
pub struct AdaptiveFlowRegistry {
    flows: HashMap<String, ExperienceLevel>,
}

impl AdaptiveFlowRegistry {
    /// Records the level; a repeated call overwrites the earlier choice.
    pub fn start(&mut self, question_id: &str, level: ExperienceLevel) {
        self.flows.insert(question_id.to_string(), level);
    }

    /// Returns whether an entry was removed.
    pub fn complete(&mut self, question_id: &str) -> bool {
        self.flows.remove(question_id).is_some()
    }

    pub fn is_active(&self, question_id: &str) -> bool {
        self.flows.contains_key(question_id)
    }

    pub fn level_of(&self, question_id: &str) -> Option<ExperienceLevel> {
        self.flows.get(question_id).copied()
    }

    pub fn active_count(&self) -> usize {
        self.flows.len()
    }

    pub fn clear_all(&mut self) {
        self.flows.clear();
    }
}
