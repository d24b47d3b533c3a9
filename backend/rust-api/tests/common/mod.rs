#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use tower::ServiceExt;

use examroom_api::{
    config::Config,
    create_router,
    models::{AnswerOption, CorrectAnswer, Exam, ExamStatus, Question, QuestionType},
    services::AppState,
    store::memory::MemoryStore,
};

/// Builds the full router over an empty in-memory store. Each test
/// seeds the catalog it needs through the returned store handle.
pub async fn create_test_app() -> (Router, Arc<MemoryStore>) {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::new());

    let config = Config {
        mongo_uri: "mongodb://unused-in-tests".to_string(),
        mongo_database: "examroom_test".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
    };

    let state = Arc::new(AppState::with_stores(config, store.clone(), store.clone()));

    (create_router(state), store)
}

/// A published exam whose window comfortably brackets "now".
pub fn published_exam(id: &str, max_attempts: u32, passing_score: f64, total_points: i64) -> Exam {
    let now = Utc::now();
    Exam {
        id: id.to_string(),
        title: format!("{} exam", id),
        class_id: None,
        status: ExamStatus::Published,
        start_date: now - Duration::hours(1),
        end_date: now + Duration::hours(1),
        duration_minutes: 60,
        max_attempts,
        passing_score,
        total_points,
    }
}

pub fn option_id(question_id: &str, key: &str) -> String {
    format!("{}-{}", question_id, key.to_lowercase())
}

/// Seeds a question with lettered options and marks the given keys as
/// correct. Works for every option-backed type.
pub async fn seed_question_with_options(
    store: &MemoryStore,
    exam_id: &str,
    question_id: &str,
    question_type: QuestionType,
    points: i64,
    order: i32,
    keys: &[&str],
    correct_keys: &[&str],
) {
    store
        .insert_question(Question {
            id: question_id.to_string(),
            exam_id: Some(exam_id.to_string()),
            question_type,
            text: format!("Question {}", question_id),
            points,
            order,
        })
        .await;

    for (i, key) in keys.iter().enumerate() {
        store
            .insert_option(AnswerOption {
                id: option_id(question_id, key),
                question_id: question_id.to_string(),
                key: key.to_string(),
                text: format!("{} text", key),
                order: i as i32,
            })
            .await;
    }

    for key in correct_keys {
        store
            .insert_correct_answer(CorrectAnswer {
                id: format!("ca-{}-{}", question_id, key.to_lowercase()),
                question_id: question_id.to_string(),
                option_id: Some(option_id(question_id, key)),
                answer_text: None,
            })
            .await;
    }
}

/// Three options A/B/C, one of them correct.
pub async fn seed_choice_question(
    store: &MemoryStore,
    exam_id: &str,
    question_id: &str,
    points: i64,
    order: i32,
    correct_key: &str,
) {
    seed_question_with_options(
        store,
        exam_id,
        question_id,
        QuestionType::MultipleChoice,
        points,
        order,
        &["A", "B", "C"],
        &[correct_key],
    )
    .await;
}

/// Manual-grade question: no options, no designated correct answer.
pub async fn seed_essay_question(
    store: &MemoryStore,
    exam_id: &str,
    question_id: &str,
    points: i64,
    order: i32,
) {
    store
        .insert_question(Question {
            id: question_id.to_string(),
            exam_id: Some(exam_id.to_string()),
            question_type: QuestionType::Essay,
            text: format!("Question {}", question_id),
            points,
            order,
        })
        .await;
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Starts an attempt and returns its id, asserting the request was
/// accepted.
pub async fn start_attempt(app: &Router, exam_id: &str, student_id: &str) -> String {
    let (status, body) = post_json(
        app,
        &format!("/api/v1/exams/{}/attempts", exam_id),
        serde_json::json!({ "student_id": student_id }),
    )
    .await;
    assert!(
        status == StatusCode::CREATED || status == StatusCode::OK,
        "start failed with {}: {}",
        status,
        body
    );
    body["_id"].as_str().unwrap().to_string()
}

pub async fn submit_option(app: &Router, attempt_id: &str, question_id: &str, key: &str) {
    let (status, body) = post_json(
        app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        serde_json::json!({
            "question_id": question_id,
            "option_id": option_id(question_id, key),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "submit failed: {}", body);
}

pub async fn complete_attempt(app: &Router, attempt_id: &str) -> serde_json::Value {
    let (status, body) = post_json(
        app,
        &format!("/api/v1/attempts/{}/complete", attempt_id),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "complete failed: {}", body);
    body
}
