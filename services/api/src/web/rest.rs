//! services/api/src/web/rest.rs
//!
//! The REST router and the master definition for the OpenAPI specification.

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::web::{
    auth, counsellor, dashboard,
    middleware::{require_auth, require_onboarding},
    onboarding, state::AppState, todos, universities,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        onboarding::submit_onboarding_handler,
        onboarding::get_onboarding_handler,
        onboarding::onboarding_status_handler,
        dashboard::dashboard_handler,
        universities::discover_handler,
        universities::recommendations_handler,
        universities::shortlist_handler,
        universities::shortlisted_handler,
        universities::lock_handler,
        universities::locked_handler,
        universities::unlock_handler,
        universities::remove_handler,
        universities::counts_handler,
        todos::list_todos_handler,
        todos::create_todo_handler,
        todos::get_todo_handler,
        todos::update_todo_handler,
        todos::complete_todo_handler,
        todos::delete_todo_handler,
        counsellor::health_handler,
        counsellor::chat_handler,
        counsellor::history_handler,
        counsellor::clear_history_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            onboarding::ProfilePayload,
            onboarding::OnboardingStatusResponse,
            dashboard::DashboardResponse,
            dashboard::ProfileStrengthResponse,
            dashboard::StageInfoResponse,
            universities::UniversityResponse,
            universities::RecommendationResponse,
            universities::UserUniversityResponse,
            universities::ShortlistRequest,
            universities::LockRequest,
            universities::LockResponse,
            universities::MessageResponse,
            universities::CountsResponse,
            todos::TodoResponse,
            todos::CreateTodoRequest,
            todos::UpdateTodoRequest,
            counsellor::ChatRequest,
            counsellor::ChatResponse,
            counsellor::ChatEntryResponse,
            counsellor::HealthResponse,
        )
    ),
    tags(
        (name = "Authentication", description = "Accounts and cookie sessions."),
        (name = "Onboarding", description = "The student profile every other feature reads."),
        (name = "Dashboard", description = "Profile strength, planning stage and top tasks."),
        (name = "Universities", description = "Catalogue, recommendations and the shortlist/lock lifecycle."),
        (name = "Todos", description = "Application tasks."),
        (name = "Counsellor", description = "AI counsellor chat that can act on the plan.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds every `/api` route. Onboarding routes need a session; everything
/// else also needs a completed profile.
pub fn api_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/counsellor/health", get(counsellor::health_handler));

    let onboarding_routes = Router::new()
        .route(
            "/onboarding",
            post(onboarding::submit_onboarding_handler).get(onboarding::get_onboarding_handler),
        )
        .route("/onboarding/status", get(onboarding::onboarding_status_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    // Layers run outermost-last, so `require_auth` runs before `require_onboarding`.
    let planner_routes = Router::new()
        .route("/dashboard", get(dashboard::dashboard_handler))
        .route("/universities/discover", get(universities::discover_handler))
        .route(
            "/universities/recommendations",
            get(universities::recommendations_handler),
        )
        .route("/universities/shortlist", post(universities::shortlist_handler))
        .route("/universities/shortlisted", get(universities::shortlisted_handler))
        .route("/universities/lock", post(universities::lock_handler))
        .route("/universities/locked", get(universities::locked_handler))
        .route(
            "/universities/unlock/{university_id}",
            post(universities::unlock_handler),
        )
        .route(
            "/universities/remove/{university_id}",
            delete(universities::remove_handler),
        )
        .route("/universities/counts", get(universities::counts_handler))
        .route(
            "/todos",
            get(todos::list_todos_handler).post(todos::create_todo_handler),
        )
        .route(
            "/todos/{todo_id}",
            get(todos::get_todo_handler)
                .patch(todos::update_todo_handler)
                .delete(todos::delete_todo_handler),
        )
        .route("/todos/{todo_id}/complete", post(todos::complete_todo_handler))
        .route("/counsellor/chat", post(counsellor::chat_handler))
        .route(
            "/counsellor/history",
            get(counsellor::history_handler).delete(counsellor::clear_history_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_onboarding,
        ))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(onboarding_routes)
        .merge(planner_routes)
        .with_state(state)
}
