// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'quiz_attempts' table. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub course_id: Option<Uuid>,
    pub correct: i32,
    pub total: i32,
    /// Percentage or raw, as supplied; derived as a percentage otherwise.
    pub score: f64,
    pub attempted_at: DateTime<Utc>,
}

/// DTO for recording a finished quiz.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttemptRequest {
    pub quiz_id: String,
    #[serde(default)]
    pub course_id: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub correct: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub total: i32,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Supplied score wins; otherwise round(correct / total * 100), 0 when total is 0.
pub fn attempt_score(correct: i32, total: i32, supplied: Option<f64>) -> f64 {
    match supplied {
        Some(score) if score.is_finite() => score,
        _ if total > 0 => ((correct as f64 / total as f64) * 100.0).round(),
        _ => 0.0,
    }
}

/// Represents the 'course_progress' table, one row per (user, course).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    /// 0 - 100.
    pub percent_complete: i32,
    pub completed_items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseProgress {
    pub fn new(user_id: Uuid, course_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            percent_complete: 0,
            completed_items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks an item complete (idempotent) and recomputes the percentage.
    pub fn complete(&mut self, item_id: &str, lesson_count: i32) {
        if !self.completed_items.iter().any(|i| i == item_id) {
            self.completed_items.push(item_id.to_string());
        }
        self.percent_complete = if lesson_count > 0 {
            let pct = (self.completed_items.len() as f64 / lesson_count as f64) * 100.0;
            pct.round().min(100.0) as i32
        } else {
            0
        };
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub item_id: String,
}
