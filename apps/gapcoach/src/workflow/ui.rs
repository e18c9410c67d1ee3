//! Presentation-only flags the front end reads back between renders.
//! Nothing in the workflow depends on these values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerTab {
    #[default]
    Original,
    Followup,
}

/// A single front-end state change, as sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiCommand {
    SetActiveTab { question_id: String, tab: AnswerTab },
    OpenAdaptiveModal { question_id: String },
    CloseAdaptiveModal,
    SetSubmitting { value: bool },
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct UiState {
    active_tabs: HashMap<String, AnswerTab>,
    /// Question shown in the experience-check modal, if open.
    adaptive_modal: Option<String>,
    is_submitting: bool,
}

impl UiState {
    pub fn active_tab(&self, question_id: &str) -> AnswerTab {
        self.active_tabs.get(question_id).copied().unwrap_or_default()
    }

    pub fn set_active_tab(&mut self, question_id: &str, tab: AnswerTab) {
        self.active_tabs.insert(question_id.to_string(), tab);
    }

    pub fn open_adaptive_modal(&mut self, question_id: &str) {
        self.adaptive_modal = Some(question_id.to_string());
    }

    pub fn close_adaptive_modal(&mut self) {
        self.adaptive_modal = None;
    }

    /// Closes the modal only if it is showing `question_id`.
    pub fn close_adaptive_modal_for(&mut self, question_id: &str) {
        if self.adaptive_modal.as_deref() == Some(question_id) {
            self.adaptive_modal = None;
        }
    }

    pub fn adaptive_modal(&self) -> Option<&str> {
        self.adaptive_modal.as_deref()
    }

    pub fn set_submitting(&mut self, value: bool) {
        self.is_submitting = value;
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn apply(&mut self, command: UiCommand) {
        match command {
            UiCommand::SetActiveTab { question_id, tab } => self.set_active_tab(&question_id, tab),
            UiCommand::OpenAdaptiveModal { question_id } => self.open_adaptive_modal(&question_id),
            UiCommand::CloseAdaptiveModal => self.close_adaptive_modal(),
            UiCommand::SetSubmitting { value } => self.set_submitting(value),
        }
    }

    pub fn forget(&mut self, question_id: &str) {
        self.active_tabs.remove(question_id);
        self.close_adaptive_modal_for(question_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_defaults_to_original() {
        let mut ui = UiState::default();
        assert_eq!(ui.active_tab("q1"), AnswerTab::Original);
        ui.set_active_tab("q1", AnswerTab::Followup);
        assert_eq!(ui.active_tab("q1"), AnswerTab::Followup);
    }

    #[test]
    fn test_modal_closes_only_for_its_question() {
        let mut ui = UiState::default();
        ui.open_adaptive_modal("q1");
        ui.close_adaptive_modal_for("q2");
        assert_eq!(ui.adaptive_modal(), Some("q1"));
        ui.close_adaptive_modal_for("q1");
        assert_eq!(ui.adaptive_modal(), None);
    }

    #[test]
    fn test_apply_commands_from_json() {
        let mut ui = UiState::default();
        let open: UiCommand =
            serde_json::from_str(r#"{"action": "open_adaptive_modal", "question_id": "q9"}"#).unwrap();
        ui.apply(open);
        assert_eq!(ui.adaptive_modal(), Some("q9"));

        let tab: UiCommand = serde_json::from_str(
            r#"{"action": "set_active_tab", "question_id": "q9", "tab": "followup"}"#,
        )
        .unwrap();
        ui.apply(tab);
        ui.apply(UiCommand::SetSubmitting { value: true });

        assert_eq!(ui.active_tab("q9"), AnswerTab::Followup);
        assert!(ui.is_submitting());
    }
}
