// src/store/memory.rs

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QuizFilter, Store, StoreError};
use crate::models::{
    course::Course,
    payment::{Payment, PaymentStatus},
    progress::{CourseProgress, QuizAttempt},
    quiz::Quiz,
};

#[derive(Default)]
struct Tables {
    courses: Vec<Course>,
    quizzes: Vec<Quiz>,
    attempts: Vec<QuizAttempt>,
    progress: Vec<CourseProgress>,
    payments: Vec<Payment>,
}

impl Tables {
    fn slug_taken(&self, slug: Option<&str>, except: Uuid) -> bool {
        slug.is_some_and(|slug| {
            self.quizzes
                .iter()
                .any(|q| q.id != except && q.slug.as_deref() == Some(slug))
        })
    }

    fn payment_id_taken(&self, gateway_payment_id: Option<&str>, except: Uuid) -> bool {
        gateway_payment_id.is_some_and(|pid| {
            self.payments
                .iter()
                .any(|p| p.id != except && p.gateway_payment_id.as_deref() == Some(pid))
        })
    }
}

/// In-process store with the same constraints as the Postgres schema.
///
/// A single write lock around each operation makes the payment commit atomic.
/// Used for local development (`DATABASE_URL=memory`) and the test suite.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `commit_verified_payment` abort after its first
    /// write, to exercise rollback.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.read().await.payments.clone()
    }

    pub async fn attempts(&self) -> Vec<QuizAttempt> {
        self.tables.read().await.attempts.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_course(&self, course: &Course) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.courses.iter().any(|c| c.id == course.id) {
            return Err(StoreError::Duplicate("courses_pkey".to_string()));
        }
        tables.courses.push(course.clone());
        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let tables = self.tables.read().await;
        let mut courses = tables.courses.clone();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(courses)
    }

    async fn enroll(&self, course_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let course = tables
            .courses
            .iter_mut()
            .find(|c| c.id == course_id)
            .ok_or(StoreError::NotFound)?;
        if course.is_enrolled(user_id) {
            return Ok(false);
        }
        course.students.push(user_id);
        Ok(true)
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(quiz.slug.as_deref(), quiz.id) {
            return Err(StoreError::Duplicate("quizzes_slug_key".to_string()));
        }
        tables.quizzes.push(quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.quizzes.iter().find(|q| q.id == id).cloned())
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StoreError> {
        let tables = self.tables.read().await;
        let mut quizzes: Vec<Quiz> = tables
            .quizzes
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quizzes)
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(quiz.slug.as_deref(), quiz.id) {
            return Err(StoreError::Duplicate("quizzes_slug_key".to_string()));
        }
        let stored = tables
            .quizzes
            .iter_mut()
            .find(|q| q.id == quiz.id)
            .ok_or(StoreError::NotFound)?;
        *stored = quiz.clone();
        Ok(())
    }

    async fn delete_quiz(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.quizzes.len();
        tables.quizzes.retain(|q| q.id != id);
        Ok(tables.quizzes.len() < before)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError> {
        self.tables.write().await.attempts.push(attempt.clone());
        Ok(())
    }

    async fn count_attempts(&self, user_id: Uuid, course_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.course_id == Some(course_id))
            .count();
        Ok(count as i64)
    }

    async fn get_or_create_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<CourseProgress, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.course_id == course_id)
        {
            return Ok(existing.clone());
        }
        let progress = CourseProgress::new(user_id, course_id);
        tables.progress.push(progress.clone());
        Ok(progress)
    }

    async fn save_progress(&self, progress: &CourseProgress) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .progress
            .iter_mut()
            .find(|p| p.id == progress.id)
            .ok_or(StoreError::NotFound)?;
        *stored = progress.clone();
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.payment_id_taken(payment.gateway_payment_id.as_deref(), payment.id) {
            return Err(StoreError::Duplicate(
                "payments_gateway_payment_id_key".to_string(),
            ));
        }
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    async fn commit_verified_payment(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let mut tables = self.tables.write().await;

        // Work on a scratch copy; it replaces the live tables only on success.
        let mut payments = tables.payments.clone();
        let mut courses = tables.courses.clone();

        let pending = payments.iter().position(|p| {
            p.gateway_order_id == payment.gateway_order_id
                && p.user_id == payment.user_id
                && p.course_id == payment.course_id
                && p.status == PaymentStatus::Created
        });
        let except = pending.map(|i| payments[i].id).unwrap_or(payment.id);
        if tables.payment_id_taken(payment.gateway_payment_id.as_deref(), except) {
            return Err(StoreError::Duplicate(
                "payments_gateway_payment_id_key".to_string(),
            ));
        }

        let stored = match pending {
            Some(i) => {
                let row = &mut payments[i];
                row.gateway_payment_id = payment.gateway_payment_id.clone();
                row.gateway_signature = payment.gateway_signature.clone();
                row.amount = payment.amount;
                row.currency = payment.currency.clone();
                row.status = PaymentStatus::Paid;
                row.raw = payment.raw.clone();
                row.updated_at = Utc::now();
                row.clone()
            }
            None => {
                let mut row = payment.clone();
                row.status = PaymentStatus::Paid;
                payments.push(row.clone());
                row
            }
        };

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("commit aborted".to_string()));
        }

        let course = courses
            .iter_mut()
            .find(|c| c.id == payment.course_id)
            .ok_or(StoreError::NotFound)?;
        if !course.is_enrolled(payment.user_id) {
            course.students.push(payment.user_id);
        }

        tables.payments = payments;
        tables.courses = courses;
        Ok(stored)
    }
}
