// tests/progress_tests.rs

mod common;

use academy_backend::models::user::Role;
use common::spawn_app;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
async fn attempt_score_is_derived_when_not_supplied() {
    let app = spawn_app().await;
    let course = app.seed_course(0, 4).await;
    let (user, token) = app.login(Role::Student);
    let quiz_id = Uuid::new_v4();

    let response = app
        .client
        .post(app.url("/api/progress/quiz-attempt"))
        .bearer_auth(&token)
        .json(&json!({
            "quizId": quiz_id,
            "courseId": course.id,
            "correct": 2,
            "total": 3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt"]["score"], 67.0);
    assert_eq!(body["attempt"]["userId"], user.to_string());

    let supplied: Value = app
        .client
        .post(app.url("/api/progress/quiz-attempt"))
        .bearer_auth(&token)
        .json(&json!({ "quizId": quiz_id, "correct": 1, "total": 3, "score": 10 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(supplied["attempt"]["score"], 10.0);
    assert!(supplied["attempt"]["courseId"].is_null());

    assert_eq!(app.store.attempts().await.len(), 2);
}

#[tokio::test]
async fn attempt_requires_a_valid_quiz_id() {
    let app = spawn_app().await;
    let (_, token) = app.login(Role::Student);

    let response = app
        .client
        .post(app.url("/api/progress/quiz-attempt"))
        .bearer_auth(&token)
        .json(&json!({ "quizId": "nope", "correct": 1, "total": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn course_progress_tracks_completed_items() {
    let app = spawn_app().await;
    let course = app.seed_course(0, 4).await;
    let (_, token) = app.login(Role::Student);
    let progress_url = app.url(&format!("/api/progress/course/{}", course.id));

    let initial: Value = app
        .client
        .get(&progress_url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(initial["progress"]["percentComplete"], 0);
    assert_eq!(initial["quizzesAttempted"], 0);

    for _ in 0..2 {
        let response = app
            .client
            .post(app.url(&format!("/api/progress/course/{}/complete", course.id)))
            .bearer_auth(&token)
            .json(&json!({ "itemId": "lesson-1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    app.client
        .post(app.url("/api/progress/quiz-attempt"))
        .bearer_auth(&token)
        .json(&json!({ "quizId": Uuid::new_v4(), "courseId": course.id, "correct": 1, "total": 1 }))
        .send()
        .await
        .unwrap();

    let after: Value = app
        .client
        .get(&progress_url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["progress"]["percentComplete"], 25);
    assert_eq!(after["progress"]["completedItems"], json!(["lesson-1"]));
    assert_eq!(after["quizzesAttempted"], 1);
}

#[tokio::test]
async fn progress_for_unknown_course_is_404() {
    let app = spawn_app().await;
    let (_, token) = app.login(Role::Student);

    let response = app
        .client
        .get(app.url(&format!("/api/progress/course/{}", Uuid::new_v4())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
