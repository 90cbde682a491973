// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{course, payment, progress, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Course reads are public; everything else requires a bearer token.
/// * Applies global middleware (Trace, CORS).
/// * Injects the shared `AppState`.
pub fn create_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let course_routes = Router::new()
        .route("/", get(course::list_courses))
        .route("/{id}", get(course::get_course))
        // Protected course routes
        .merge(
            Router::new()
                .route("/", post(course::create_course))
                .route("/{id}/enroll", post(course::enroll))
                .route_layer(auth.clone()),
        );

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{id}/publish", post(quiz::publish_quiz))
        .route("/{id}/submit", post(quiz::submit_quiz))
        .route_layer(auth.clone());

    let payment_routes = Router::new()
        .route("/courses/{id}/create-order", post(payment::create_order))
        .route("/verify-payment", post(payment::verify_payment))
        .route_layer(auth.clone());

    let progress_routes = Router::new()
        .route("/quiz-attempt", post(progress::record_quiz_attempt))
        .route("/course/{course_id}", get(progress::get_course_progress))
        .route("/course/{course_id}/complete", post(progress::complete_item))
        .route_layer(auth);

    Router::new()
        .route("/health", get(health))
        .nest("/api/courses", course_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/progress", progress_routes)
        .fallback(not_found)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}
