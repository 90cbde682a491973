// src/handlers/progress.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        progress::{CompleteItemRequest, QuizAttempt, RecordAttemptRequest, attempt_score},
        user::AuthUser,
    },
    store::Store,
    utils::extract::{ApiJson, parse_id},
};

/// Appends a finished quiz attempt to the caller's history.
///
/// Not transactional with grading: a client that never calls this loses the attempt.
pub async fn record_quiz_attempt(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    ApiJson(req): ApiJson<RecordAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = parse_id(&req.quiz_id, "quizId")?;
    let course_id = match req.course_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_id(raw, "courseId")?),
        _ => None,
    };

    let attempt = QuizAttempt {
        id: Uuid::new_v4(),
        user_id: user.id,
        quiz_id,
        course_id,
        correct: req.correct,
        total: req.total,
        score: attempt_score(req.correct, req.total, req.score),
        attempted_at: Utc::now(),
    };

    store.insert_attempt(&attempt).await?;

    Ok(Json(json!({ "attempt": attempt })))
}

/// Returns (creating on first access) the caller's progress in a course.
pub async fn get_course_progress(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course_id = parse_id(&course_id, "courseId")?;
    if store.get_course(course_id).await?.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let progress = store.get_or_create_progress(user.id, course_id).await?;
    let attempted = store.count_attempts(user.id, course_id).await?;

    Ok(Json(json!({
        "progress": progress,
        "quizzesAttempted": attempted,
    })))
}

pub async fn complete_item(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(course_id): Path<String>,
    ApiJson(req): ApiJson<CompleteItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course_id = parse_id(&course_id, "courseId")?;
    let course = store
        .get_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let mut progress = store.get_or_create_progress(user.id, course.id).await?;
    progress.complete(req.item_id.trim(), course.lesson_count);
    store.save_progress(&progress).await?;

    Ok(Json(json!({ "progress": progress })))
}
