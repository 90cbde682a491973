// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        quiz::{
            CreateQuizRequest, Quiz, QuizPatch, QuizView, SubmitQuizRequest,
            UpdateQuizRequest, build_questions, grade, redact,
        },
        user::{AuthUser, Role},
    },
    store::{QuizFilter, Store, Visibility},
    utils::{
        extract::{ApiJson, parse_id},
        html::clean_html,
        slug::{derive_slug, slugify},
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuizzesQuery {
    pub course_id: Option<String>,
}

/// Normalises a caller-supplied slug. An explicit slug that cleans down to
/// nothing is rejected rather than silently replaced.
fn explicit_slug(raw: &str) -> Result<String, AppError> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(AppError::BadRequest("invalid slug".to_string()));
    }
    Ok(slug)
}

/// Loads a quiz the caller is allowed to see. Hidden quizzes look missing.
async fn load_visible(store: &dyn Store, raw_id: &str, user: AuthUser) -> Result<Quiz, AppError> {
    let id = parse_id(raw_id, "quiz id")?;
    store
        .get_quiz(id)
        .await?
        .filter(|quiz| quiz.visible_to(user.id, user.role))
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Loads a quiz for mutation: the caller must be the instructor who created it.
/// Visibility is not applied here, so a non-owner gets 403 even on a draft.
async fn load_owned(store: &dyn Store, raw_id: &str, user: AuthUser) -> Result<Quiz, AppError> {
    let id = parse_id(raw_id, "quiz id")?;
    let quiz = store
        .get_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
    if user.role != Role::Instructor || quiz.created_by != user.id {
        return Err(AppError::Forbidden(
            "Only the quiz creator can modify it".to_string(),
        ));
    }
    Ok(quiz)
}

/// Creates a quiz under an existing course.
///
/// * Only instructors may author quizzes.
/// * Every question is validated before anything is written.
/// * The slug is derived from the title when not supplied.
pub async fn create_quiz(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if user.role != Role::Instructor {
        return Err(AppError::Forbidden(
            "Only instructors can create quizzes".to_string(),
        ));
    }

    let course_id = parse_id(&req.course_id, "courseId")?;
    if store.get_course(course_id).await?.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let questions = build_questions(&req.questions)?;

    let title = clean_html(&req.title);
    let slug = match req.slug.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => explicit_slug(raw)?,
        _ => derive_slug(&title),
    };

    let now = Utc::now();
    let quiz = Quiz {
        id: Uuid::new_v4(),
        title,
        slug: Some(slug),
        description: req.description.as_deref().map(clean_html).unwrap_or_default(),
        course_id,
        created_by: user.id,
        questions,
        time_limit_minutes: req.time_limit_minutes,
        published: req.published == Some(true),
        created_at: now,
        updated_at: now,
    };

    store.insert_quiz(&quiz).await?;
    tracing::info!("Quiz {} created by {}", quiz.id, user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "quiz": redact(&quiz, user.role) })),
    ))
}

/// Lists quizzes visible to the caller, newest first, optionally for one course.
pub async fn list_quizzes(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Query(query): Query<ListQuizzesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let course_id = match query.course_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_id(raw, "courseId")?),
        _ => None,
    };

    let visibility = match user.role {
        Role::Admin => Visibility::All,
        Role::Instructor => Visibility::PublishedOrOwnedBy(user.id),
        Role::Student => Visibility::PublishedOnly,
    };

    let quizzes: Vec<QuizView> = store
        .list_quizzes(&QuizFilter {
            course_id,
            visibility,
        })
        .await?
        .iter()
        .map(|quiz| redact(quiz, user.role))
        .collect();

    Ok(Json(json!({ "quizzes": quizzes })))
}

pub async fn get_quiz(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_visible(store.as_ref(), &id, user).await?;
    Ok(Json(json!({ "quiz": redact(&quiz, user.role) })))
}

/// Applies a partial update. Every update leaves the quiz published.
pub async fn update_quiz(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut quiz = load_owned(store.as_ref(), &id, user).await?;

    let questions = req.questions.as_deref().map(build_questions).transpose()?;
    let slug = match req.slug.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(explicit_slug(raw)?),
        _ => None,
    };

    quiz.apply_update(QuizPatch {
        title: req.title.as_deref().map(clean_html),
        description: req.description.as_deref().map(clean_html),
        time_limit_minutes: req.time_limit_minutes,
        slug,
        questions,
    });

    store.update_quiz(&quiz).await?;
    tracing::info!("Quiz {} updated by {}", quiz.id, user.id);

    Ok(Json(json!({ "success": true, "quiz": redact(&quiz, user.role) })))
}

pub async fn delete_quiz(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_owned(store.as_ref(), &id, user).await?;

    if !store.delete_quiz(quiz.id).await? {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    tracing::info!("Quiz {} deleted by {}", quiz.id, user.id);

    Ok(Json(json!({ "success": true, "message": "Quiz deleted" })))
}

pub async fn publish_quiz(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut quiz = load_owned(store.as_ref(), &id, user).await?;

    quiz.apply_update(QuizPatch::default());
    store.update_quiz(&quiz).await?;

    Ok(Json(json!({ "success": true, "quiz": redact(&quiz, user.role) })))
}

/// Scores a submission. Nothing is persisted here; clients record the
/// attempt separately through the progress endpoint.
pub async fn submit_quiz(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_visible(store.as_ref(), &id, user).await?;
    let result = grade(&quiz, &req.answers);

    Ok(Json(json!({
        "success": true,
        "score": result.score,
        "total": result.total,
        "feedback": result.feedback,
    })))
}
