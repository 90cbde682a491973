// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use super::{QuizFilter, Store, StoreError, Visibility};
use crate::models::{
    course::Course,
    payment::Payment,
    progress::{CourseProgress, QuizAttempt},
    quiz::{Question, Quiz},
};

const COURSE_COLUMNS: &str = r#"
    c.id, c.title, c.description, c.created_by, c.price, c.lesson_count, c.created_at,
    COALESCE(
        array_agg(s.user_id ORDER BY s.enrolled_at) FILTER (WHERE s.user_id IS NOT NULL),
        '{}'
    ) AS students
"#;

const QUIZ_COLUMNS: &str = r#"
    id, title, slug, description, course_id, created_by, questions,
    time_limit_minutes, published, created_at, updated_at
"#;

/// Postgres-backed store. Queries are checked at runtime so the crate builds
/// without a live database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Unique violations become `Duplicate(constraint)`, everything else passes through.
fn map_write_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(db_err.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Database(err)
}

#[derive(FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    description: String,
    created_by: Uuid,
    price: i64,
    lesson_count: i32,
    created_at: DateTime<Utc>,
    students: Vec<Uuid>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            created_by: row.created_by,
            price: row.price,
            lesson_count: row.lesson_count,
            students: row.students,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuizRow {
    id: Uuid,
    title: String,
    slug: Option<String>,
    description: String,
    course_id: Uuid,
    created_by: Uuid,
    questions: Json<Vec<Question>>,
    time_limit_minutes: Option<i32>,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            course_id: row.course_id,
            created_by: row.created_by,
            questions: row.questions.0,
            time_limit_minutes: row.time_limit_minutes,
            published: row.published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressRow {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    percent_complete: i32,
    completed_items: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for CourseProgress {
    fn from(row: ProgressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            course_id: row.course_id,
            percent_complete: row.percent_complete,
            completed_items: row.completed_items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    gateway_order_id: String,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    raw: Option<serde_json::Value>,
    receipt: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            course_id: row.course_id,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_signature: row.gateway_signature,
            amount: row.amount,
            currency: row.currency,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            raw: row.raw,
            receipt: row.receipt,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_course(&self, course: &Course) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, description, created_by, price, lesson_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.created_by)
        .bind(course.price)
        .bind(course.lesson_count)
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let sql = format!(
            "SELECT {} FROM courses c LEFT JOIN course_students s ON s.course_id = c.id \
             WHERE c.id = $1 GROUP BY c.id",
            COURSE_COLUMNS
        );
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Course::from))
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let sql = format!(
            "SELECT {} FROM courses c LEFT JOIN course_students s ON s.course_id = c.id \
             GROUP BY c.id ORDER BY c.created_at DESC",
            COURSE_COLUMNS
        );
        let rows = sqlx::query_as::<_, CourseRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn enroll(&self, course_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO course_students (course_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(course_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quizzes
            (id, title, slug, description, course_id, created_by, questions,
             time_limit_minutes, published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.slug)
        .bind(&quiz.description)
        .bind(quiz.course_id)
        .bind(quiz.created_by)
        .bind(Json(&quiz.questions))
        .bind(quiz.time_limit_minutes)
        .bind(quiz.published)
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>, StoreError> {
        let sql = format!("SELECT {} FROM quizzes WHERE id = $1", QUIZ_COLUMNS);
        let row = sqlx::query_as::<_, QuizRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Quiz::from))
    }

    async fn list_quizzes(&self, filter: &QuizFilter) -> Result<Vec<Quiz>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM quizzes WHERE TRUE", QUIZ_COLUMNS));

        if let Some(course_id) = filter.course_id {
            builder.push(" AND course_id = ");
            builder.push_bind(course_id);
        }

        match filter.visibility {
            Visibility::All => {}
            Visibility::PublishedOrOwnedBy(owner) => {
                builder.push(" AND (published OR created_by = ");
                builder.push_bind(owner);
                builder.push(")");
            }
            Visibility::PublishedOnly => {
                builder.push(" AND published");
            }
        }

        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<QuizRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Quiz::from).collect())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes SET
                title = $2,
                slug = $3,
                description = $4,
                questions = $5,
                time_limit_minutes = $6,
                published = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.slug)
        .bind(&quiz.description)
        .bind(Json(&quiz.questions))
        .bind(quiz.time_limit_minutes)
        .bind(quiz.published)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn delete_quiz(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, user_id, quiz_id, course_id, correct, total, score, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.user_id)
        .bind(attempt.quiz_id)
        .bind(attempt.course_id)
        .bind(attempt.correct)
        .bind(attempt.total)
        .bind(attempt.score)
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    async fn count_attempts(&self, user_id: Uuid, course_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_or_create_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<CourseProgress, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO course_progress (id, user_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT id, user_id, course_id, percent_complete, completed_items, created_at, updated_at
            FROM course_progress
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn save_progress(&self, progress: &CourseProgress) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE course_progress
            SET percent_complete = $2, completed_items = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(progress.id)
        .bind(progress.percent_complete)
        .bind(Json(&progress.completed_items))
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments
            (id, user_id, course_id, gateway_order_id, gateway_payment_id, gateway_signature,
             amount, currency, status, raw, receipt, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payment.id)
        .bind(payment.user_id)
        .bind(payment.course_id)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_signature)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.raw)
        .bind(&payment.receipt)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    async fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payments WHERE gateway_payment_id = $1",
        )
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Payment::try_from).transpose()
    }

    async fn commit_verified_payment(&self, payment: &Payment) -> Result<Payment, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Promote the order's pending row if the order step recorded one.
        let promoted = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments SET
                gateway_payment_id = $1,
                gateway_signature = $2,
                amount = $3,
                currency = $4,
                status = 'paid',
                raw = $5,
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM payments
                WHERE gateway_order_id = $6 AND user_id = $7 AND course_id = $8
                  AND status = 'created'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE
            )
            RETURNING *
            "#,
        )
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_signature)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.raw)
        .bind(&payment.gateway_order_id)
        .bind(payment.user_id)
        .bind(payment.course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_err)?;

        let stored = match promoted {
            Some(row) => row,
            None => sqlx::query_as::<_, PaymentRow>(
                r#"
                INSERT INTO payments
                (id, user_id, course_id, gateway_order_id, gateway_payment_id, gateway_signature,
                 amount, currency, status, raw, receipt, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'paid', $9, $10, NOW(), NOW())
                RETURNING *
                "#,
            )
            .bind(payment.id)
            .bind(payment.user_id)
            .bind(payment.course_id)
            .bind(&payment.gateway_order_id)
            .bind(&payment.gateway_payment_id)
            .bind(&payment.gateway_signature)
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(&payment.raw)
            .bind(&payment.receipt)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_write_err)?,
        };

        sqlx::query(
            "INSERT INTO course_students (course_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(payment.course_id)
        .bind(payment.user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_err)?;

        tx.commit().await?;

        Payment::try_from(stored)
    }
}
