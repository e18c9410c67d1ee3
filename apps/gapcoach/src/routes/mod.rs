pub mod health;
pub mod questions;
pub mod sessions;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/reset",
            post(sessions::handle_reset_session),
        )
        .route(
            "/api/v1/sessions/:id/analysis",
            get(sessions::handle_get_analysis).post(sessions::handle_run_analysis),
        )
        .route(
            "/api/v1/sessions/:id/documents",
            post(sessions::handle_generate_documents),
        )
        .route(
            "/api/v1/sessions/:id/learning-plans",
            get(sessions::handle_learning_plans),
        )
        .route(
            "/api/v1/sessions/:id/ui",
            get(sessions::handle_get_ui).put(sessions::handle_update_ui),
        )
        // Questions
        .route(
            "/api/v1/sessions/:id/questions/:qid",
            get(questions::handle_get_question),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/answer",
            put(questions::handle_submit_answer),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/evaluate",
            post(questions::handle_evaluate),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/experience",
            post(questions::handle_choose_experience),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/deep-dive",
            post(questions::handle_deep_dive),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/refinement",
            patch(questions::handle_update_refinement),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/refine",
            post(questions::handle_refine),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/accept",
            post(questions::handle_accept),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/cancel",
            post(questions::handle_cancel),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/learning-resources",
            post(questions::handle_learning_resources),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/learning-plan",
            post(questions::handle_save_learning_plan),
        )
        .route(
            "/api/v1/sessions/:id/questions/:qid/learning-complete",
            post(questions::handle_learning_complete),
        )
        .with_state(state)
}
