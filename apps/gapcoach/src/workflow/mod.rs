pub mod adaptive_flows;
pub mod answers;
pub mod backend;
pub mod evaluations;
pub mod orchestrator;
pub mod policy;
pub mod refinement;
pub mod stage;
pub mod ui;

pub use orchestrator::{AdaptiveContext, QuestionSnapshot, WorkflowOrchestrator};
