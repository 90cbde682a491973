// tests/postgres_tests.rs
//
// Runs against a live Postgres when DATABASE_URL is set; otherwise each test
// returns early.

use academy_backend::{
    error::AppError,
    models::{
        course::Course,
        payment::{Payment, PaymentStatus},
        quiz::{Question, Quiz, QuizOption},
    },
    store::{PgStore, Store, StoreError},
};
use axum::{http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Connects and migrates, or `None` when no database is configured.
async fn pg_store() -> Option<PgStore> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) if url != "memory" => url,
        _ => {
            eprintln!("DATABASE_URL not set, skipping Postgres test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to migrate database");
    Some(store)
}

async fn seed_course(store: &PgStore) -> Course {
    let course = Course {
        id: Uuid::new_v4(),
        title: "Postgres in Practice".to_string(),
        description: String::new(),
        created_by: Uuid::new_v4(),
        price: 49900,
        lesson_count: 8,
        students: Vec::new(),
        created_at: Utc::now(),
    };
    store.insert_course(&course).await.unwrap();
    course
}

fn payment(user_id: Uuid, course_id: Uuid, order_id: &str, status: PaymentStatus) -> Payment {
    let now = Utc::now();
    Payment {
        id: Uuid::new_v4(),
        user_id,
        course_id,
        gateway_order_id: order_id.to_string(),
        gateway_payment_id: None,
        gateway_signature: None,
        amount: 49900,
        currency: "INR".to_string(),
        status,
        raw: None,
        receipt: format!("rcpt_{}", now.timestamp_millis()),
        created_at: now,
        updated_at: now,
    }
}

fn verified(mut pending: Payment, payment_id: &str) -> Payment {
    pending.id = Uuid::new_v4();
    pending.gateway_payment_id = Some(payment_id.to_string());
    pending.gateway_signature = Some("signed".to_string());
    pending.status = PaymentStatus::Paid;
    pending.raw = Some(serde_json::json!({ "paymentId": payment_id }));
    pending
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
async fn commit_promotes_the_created_row() {
    let Some(store) = pg_store().await else { return };
    let course = seed_course(&store).await;
    let user = Uuid::new_v4();
    let order_id = unique("order");
    let payment_id = unique("pay");

    let pending = payment(user, course.id, &order_id, PaymentStatus::Created);
    store.insert_payment(&pending).await.unwrap();

    let stored = store
        .commit_verified_payment(&verified(pending.clone(), &payment_id))
        .await
        .unwrap();

    // The pending row is reused rather than duplicated.
    assert_eq!(stored.id, pending.id);
    assert_eq!(stored.status, PaymentStatus::Paid);
    assert_eq!(stored.gateway_payment_id.as_deref(), Some(payment_id.as_str()));

    let found = store
        .find_payment_by_gateway_id(&payment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, pending.id);

    let course = store.get_course(course.id).await.unwrap().unwrap();
    assert_eq!(course.students, vec![user]);
}

#[tokio::test]
async fn commit_without_pending_row_inserts_one() {
    let Some(store) = pg_store().await else { return };
    let course = seed_course(&store).await;
    let user = Uuid::new_v4();

    let fresh = verified(
        payment(user, course.id, &unique("order"), PaymentStatus::Created),
        &unique("pay"),
    );
    let stored = store.commit_verified_payment(&fresh).await.unwrap();

    assert_eq!(stored.id, fresh.id);
    assert_eq!(stored.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn duplicate_gateway_payment_id_rolls_back() {
    let Some(store) = pg_store().await else { return };
    let course = seed_course(&store).await;
    let first_user = Uuid::new_v4();
    let second_user = Uuid::new_v4();
    let payment_id = unique("pay");

    let first = verified(
        payment(first_user, course.id, &unique("order"), PaymentStatus::Created),
        &payment_id,
    );
    store.commit_verified_payment(&first).await.unwrap();

    let replay = verified(
        payment(second_user, course.id, &unique("order"), PaymentStatus::Created),
        &payment_id,
    );
    let err = store.commit_verified_payment(&replay).await.unwrap_err();
    assert!(
        matches!(err, StoreError::Duplicate(ref c) if c == "payments_gateway_payment_id_key"),
        "unexpected error: {:?}",
        err
    );

    // The second payer was not enrolled by the aborted transaction.
    let course = store.get_course(course.id).await.unwrap().unwrap();
    assert_eq!(course.students, vec![first_user]);
}

#[tokio::test]
async fn roster_insert_tolerates_existing_enrollment() {
    let Some(store) = pg_store().await else { return };
    let course = seed_course(&store).await;
    let user = Uuid::new_v4();

    assert!(store.enroll(course.id, user).await.unwrap());

    let paid = verified(
        payment(user, course.id, &unique("order"), PaymentStatus::Created),
        &unique("pay"),
    );
    store.commit_verified_payment(&paid).await.unwrap();

    let course = store.get_course(course.id).await.unwrap().unwrap();
    assert_eq!(course.students, vec![user]);
}

#[tokio::test]
async fn slug_collision_maps_to_conflict() {
    let Some(store) = pg_store().await else { return };
    let course = seed_course(&store).await;
    let slug = unique("quiz").replace('_', "-");

    let quiz = |slug: &str| {
        let now = Utc::now();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        Quiz {
            id: Uuid::new_v4(),
            title: "Indexes".to_string(),
            slug: Some(slug.to_string()),
            description: String::new(),
            course_id: course.id,
            created_by: course.created_by,
            questions: vec![Question {
                id: Uuid::new_v4(),
                text: "Which index type backs a UNIQUE constraint?".to_string(),
                options: vec![
                    QuizOption { id: a, text: "B-tree".to_string() },
                    QuizOption { id: b, text: "GIN".to_string() },
                ],
                correct_option_id: a,
                explanation: String::new(),
                points: 1,
            }],
            time_limit_minutes: None,
            published: false,
            created_at: now,
            updated_at: now,
        }
    };

    store.insert_quiz(&quiz(&slug)).await.unwrap();
    let err = store.insert_quiz(&quiz(&slug)).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(ref c) if c == "quizzes_slug_key"));

    let response = AppError::from(err).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
