// src/handlers/course.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        course::{Course, CourseSummary, CreateCourseRequest},
        user::AuthUser,
    },
    store::Store,
    utils::{
        extract::{ApiJson, parse_id},
        html::clean_html,
    },
};

/// Creates a course. Instructors and admins only.
pub async fn create_course(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !user.role.is_privileged() {
        return Err(AppError::Forbidden(
            "Only instructors can create courses".to_string(),
        ));
    }

    let course = Course {
        id: Uuid::new_v4(),
        title: clean_html(&req.title),
        description: req.description.as_deref().map(clean_html).unwrap_or_default(),
        created_by: user.id,
        price: req.price,
        lesson_count: req.lesson_count,
        students: Vec::new(),
        created_at: Utc::now(),
    };
    store.insert_course(&course).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "course": CourseSummary::from(&course) })),
    ))
}

pub async fn list_courses(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    let courses: Vec<CourseSummary> = store
        .list_courses()
        .await?
        .iter()
        .map(CourseSummary::from)
        .collect();

    Ok(Json(json!({ "courses": courses })))
}

pub async fn get_course(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "course id")?;
    let course = store
        .get_course(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(json!({ "course": CourseSummary::from(&course) })))
}

/// Enrolls the caller in a free course. Paid courses go through checkout.
pub async fn enroll(
    State(store): State<Arc<dyn Store>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "course id")?;
    let course = store
        .get_course(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if !course.is_free() {
        return Err(AppError::BadRequest(
            "Paid courses require checkout".to_string(),
        ));
    }

    let newly_enrolled = store.enroll(course.id, user.id).await?;
    if newly_enrolled {
        tracing::info!("User {} enrolled in free course {}", user.id, course.id);
    }

    Ok(Json(json!({
        "success": true,
        "enrolled": true,
        "alreadyEnrolled": !newly_enrolled,
    })))
}
