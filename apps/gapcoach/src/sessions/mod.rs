//! Per-user workflow sessions.
//!
//! A session owns one analysis pipeline and one workflow orchestrator.
//! Sessions live in memory only; restarting the service drops them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::analysis::backend::AnalysisBackend;
use crate::analysis::AnalysisPipeline;
use crate::errors::AppError;
use crate::models::question::Question;
use crate::workflow::backend::AdaptiveBackend;
use crate::workflow::orchestrator::WorkflowSummary;
use crate::workflow::{AdaptiveContext, WorkflowOrchestrator};

pub struct WorkflowSession {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub workflow: WorkflowOrchestrator,
    pub analysis: AnalysisPipeline,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub user_id: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub question_count: usize,
    /// Every generated question has an answer.
    pub all_answered: bool,
    pub workflow: WorkflowSummary,
}

impl WorkflowSession {
    /// Looks up a generated question by id.
    pub fn question(&self, question_id: &str) -> Result<Question, AppError> {
        self.analysis
            .question(question_id)
            .ok_or_else(|| AppError::NotFound(format!("Question {question_id} not found")))
    }

    pub fn adaptive_context(&self) -> AdaptiveContext {
        let (parsed_cv, parsed_jd) = self.analysis.parsed_documents();
        AdaptiveContext {
            user_id: self.user_id.clone(),
            parsed_cv,
            parsed_jd,
        }
    }

    pub fn info(&self) -> SessionInfo {
        let question_count = self.analysis.question_count();
        SessionInfo {
            id: self.id,
            user_id: self.user_id.clone(),
            language: self.workflow.language().to_string(),
            created_at: self.created_at,
            question_count,
            all_answered: question_count > 0 && self.workflow.all_answered(question_count),
            workflow: self.workflow.summary(),
        }
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<WorkflowSession>>>,
    adaptive: Arc<dyn AdaptiveBackend>,
    analysis: Arc<dyn AnalysisBackend>,
    default_language: String,
}

impl SessionRegistry {
    pub fn new(
        adaptive: Arc<dyn AdaptiveBackend>,
        analysis: Arc<dyn AnalysisBackend>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            adaptive,
            analysis,
            default_language: default_language.into(),
        }
    }

    pub async fn create(
        &self,
        user_id: &str,
        language: Option<String>,
    ) -> Result<Arc<WorkflowSession>, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user_id cannot be empty".to_string()));
        }
        let language = language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.default_language.clone());

        let session = Arc::new(WorkflowSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            workflow: WorkflowOrchestrator::new(self.adaptive.clone(), language.clone()),
            analysis: AnalysisPipeline::new(self.analysis.clone(), language),
        });
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        info!("Session {} created for user {}", session.id, user_id);
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<WorkflowSession>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!("Session {} removed", id);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Session {id} not found"))),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
