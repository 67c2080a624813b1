// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{executable, health, question, questionnaire},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Attemptor routes (questionnaires, executions) require a bearer token.
/// * Admin routes additionally require the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let attemptor_routes = Router::new()
        .route("/api/questionnaires", get(questionnaire::list_active_questionnaires))
        .route("/api/questionnaires/{id}/attempt", get(executable::attempt_form))
        .route("/api/questionnaires/{id}/executables", post(executable::submit_answers))
        .route("/api/executables", get(executable::list_executables))
        .route("/api/executables/{id}", get(executable::get_executable))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/api/admin/questionnaires",
            get(questionnaire::list_questionnaires).post(questionnaire::create_questionnaire),
        )
        .route(
            "/api/admin/questionnaires/{id}",
            get(questionnaire::get_questionnaire)
                .put(questionnaire::update_questionnaire)
                .delete(questionnaire::delete_questionnaire),
        )
        .route("/api/admin/questionnaires/{id}/questions", post(question::create_question))
        .route("/api/admin/questions/{id}", delete(question::delete_question))
        .route("/api/admin/questions/{id}/alternatives", post(question::create_alternative))
        .route("/api/admin/alternatives/{id}", delete(question::delete_alternative))
        // Auth first, then Admin check
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health::health))
        .merge(attemptor_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
