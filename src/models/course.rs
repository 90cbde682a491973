// src/models/course.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::extract::validate_not_blank;

/// Represents the 'courses' table plus its enrollment roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    /// Minor currency units (e.g. paise). 0 means free.
    pub price: i64,
    /// Number of lessons, used to compute progress percentages.
    pub lesson_count: i32,
    /// Enrollment roster. Only ever appended to.
    pub students: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Course {
    pub fn is_free(&self) -> bool {
        self.price <= 0
    }

    pub fn is_enrolled(&self, user_id: Uuid) -> bool {
        self.students.contains(&user_id)
    }
}

/// Public course listing; the roster itself is not exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub price: i64,
    pub lesson_count: i32,
    pub student_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            created_by: course.created_by,
            price: course.price,
            lesson_count: course.lesson_count,
            student_count: course.students.len(),
            created_at: course.created_at,
        }
    }
}

/// DTO for creating a new course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[validate(length(max = 200), custom(function = validate_not_blank))]
    pub title: String,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub price: i64,
    #[validate(range(min = 0, max = 10000))]
    #[serde(default)]
    pub lesson_count: i32,
}
