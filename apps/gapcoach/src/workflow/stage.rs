use serde::{Deserialize, Serialize};

/// Why a question ended up accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceReason {
    /// The evaluation met the quality threshold.
    Quality,
    /// The refinement cap was reached; accepted regardless of score.
    IterationCap,
    /// The user chose "accept anyway" while refinement was requested.
    UserForced,
}

/// Where a single question sits in the adaptive workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum QuestionStage {
    #[default]
    Unstarted,
    DeepDivePrompts,
    LearningResources,
    AwaitingEvaluation,
    NeedsRefinement,
    /// Reported while a refine call is in flight; never stored.
    Refining,
    Accepted {
        reason: AcceptanceReason,
    },
    NoExperience,
    FlowComplete,
}

impl QuestionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuestionStage::Accepted { .. } | QuestionStage::NoExperience | QuestionStage::FlowComplete
        )
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(
            self,
            QuestionStage::DeepDivePrompts | QuestionStage::LearningResources
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionStage::Unstarted => "unstarted",
            QuestionStage::DeepDivePrompts => "deep_dive_prompts",
            QuestionStage::LearningResources => "learning_resources",
            QuestionStage::AwaitingEvaluation => "awaiting_evaluation",
            QuestionStage::NeedsRefinement => "needs_refinement",
            QuestionStage::Refining => "refining",
            QuestionStage::Accepted { .. } => "accepted",
            QuestionStage::NoExperience => "no_experience",
            QuestionStage::FlowComplete => "flow_complete",
        }
    }
}

/// Backend call currently in flight for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperation {
    StartingFlow,
    SubmittingInputs,
    Evaluating,
    Refining,
    FetchingResources,
    SavingPlan,
}
