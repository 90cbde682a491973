// src/store/mod.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    course::Course,
    payment::Payment,
    progress::{CourseProgress, QuizAttempt},
    quiz::Quiz,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint collision; carries the constraint name.
    #[error("duplicate key violates {0}")]
    Duplicate(String),

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored document is malformed: {0}")]
    Corrupt(String),
}

/// Which quizzes a listing may include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    PublishedOrOwnedBy(Uuid),
    PublishedOnly,
}

#[derive(Debug, Clone, Copy)]
pub struct QuizFilter {
    pub course_id: Option<Uuid>,
    pub visibility: Visibility,
}

impl QuizFilter {
    pub fn matches(&self, quiz: &Quiz) -> bool {
        let course_ok = self.course_id.is_none_or(|id| quiz.course_id == id);
        let visible = match self.visibility {
            Visibility::All => true,
            Visibility::PublishedOrOwnedBy(owner) => quiz.published || quiz.created_by == owner,
            Visibility::PublishedOnly => quiz.published,
        };
        course_ok && visible
    }
}

/// Persistence boundary for the platform.
///
/// Every method is a single round trip except `commit_verified_payment`,
/// which must apply all of its writes or none of them.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_course(&self, course: &Course) -> Result<(), StoreError>;
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;
    /// Adds the user to the roster. Returns `false` if already enrolled.
    async fn enroll(&self, course_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Fails with `Duplicate` on a slug collision.
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError>;
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>, StoreError>;
    /// Newest first.
    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StoreError>;
    /// Replaces the stored quiz. Fails with `NotFound` or `Duplicate`.
    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), StoreError>;
    async fn delete_quiz(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError>;
    async fn count_attempts(&self, user_id: Uuid, course_id: Uuid) -> Result<i64, StoreError>;

    async fn get_or_create_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<CourseProgress, StoreError>;
    async fn save_progress(&self, progress: &CourseProgress) -> Result<(), StoreError>;

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError>;
    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, StoreError>;
    /// In one transaction: promote the matching `created` row for the order
    /// (or insert a new row) as `paid`, and enroll the payer.
    async fn commit_verified_payment(&self, payment: &Payment) -> Result<Payment, StoreError>;
}
