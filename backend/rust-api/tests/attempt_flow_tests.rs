mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use examroom_api::models::{ExamStatus, QuestionType};

use common::{
    complete_attempt, create_test_app, get_json, option_id, post_json, published_exam,
    seed_choice_question, seed_question_with_options, start_attempt, submit_option,
};

#[tokio::test]
async fn start_creates_attempt_and_second_start_resumes_it() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 10)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let (status, body) = post_json(
        &app,
        "/api/v1/exams/exam-basic/attempts",
        json!({ "student_id": "student-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["exam_id"], "exam-basic");
    let first_id = body["_id"].as_str().unwrap().to_string();

    // Idempotent resume: same attempt, no second row, 200 instead of 201.
    let (status, body) = post_json(
        &app,
        "/api/v1/exams/exam-basic/attempts",
        json!({ "student_id": "student-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"].as_str().unwrap(), first_id);
}

#[tokio::test]
async fn submitting_twice_for_one_question_keeps_a_single_answer() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 5)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;

    submit_option(&app, &attempt_id, "q1", "B").await;
    // Second submission replaces the first.
    submit_option(&app, &attempt_id, "q1", "A").await;

    let body = complete_attempt(&app, &attempt_id).await;
    assert_eq!(body["answers"].as_object().unwrap().len(), 1);
    assert_eq!(
        body["answers"]["q1"]["selected_option_ids"],
        json!([option_id("q1", "A")])
    );
    // The replacement answer is the one that got graded.
    assert_eq!(body["score"], 0);
}

#[tokio::test]
async fn completion_grades_objective_questions_and_aggregates_the_score() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 10)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;
    seed_choice_question(&store, "exam-basic", "q2", 5, 2, "A").await;

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;
    submit_option(&app, &attempt_id, "q1", "B").await; // correct
    submit_option(&app, &attempt_id, "q2", "C").await; // wrong

    let body = complete_attempt(&app, &attempt_id).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["score"], 5);
    assert_eq!(body["percentage"].as_f64().unwrap(), 50.0);
    assert!(body["completed_at"].is_string());

    assert_eq!(body["answers"]["q1"]["is_correct"], true);
    assert_eq!(body["answers"]["q1"]["points_awarded"], 5);
    assert_eq!(body["answers"]["q2"]["is_correct"], false);
    assert_eq!(body["answers"]["q2"]["points_awarded"], 0);

    // 50% < 60% passing threshold.
    let (status, results) =
        get_json(&app, &format!("/api/v1/attempts/{}/results", attempt_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["summary"]["passed"], false);
    assert_eq!(results["summary"]["score"], 5);
    assert_eq!(results["summary"]["total_points"], 10);
    assert_eq!(results["summary"]["correct_count"], 1);
    assert_eq!(results["summary"]["incorrect_count"], 1);
    assert_eq!(results["summary"]["unanswered_count"], 0);

    let breakdown = results["breakdown"].as_array().unwrap();
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0]["question_id"], "q1");
    assert_eq!(breakdown[0]["selected_option_keys"], json!(["B"]));
    assert_eq!(breakdown[1]["question_id"], "q2");
    assert_eq!(breakdown[1]["is_correct"], false);
}

#[tokio::test]
async fn unanswered_questions_score_zero() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 10)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;
    seed_choice_question(&store, "exam-basic", "q2", 5, 2, "A").await;

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;
    submit_option(&app, &attempt_id, "q1", "B").await;

    let body = complete_attempt(&app, &attempt_id).await;
    assert_eq!(body["score"], 5);

    let (_, results) = get_json(&app, &format!("/api/v1/attempts/{}/results", attempt_id)).await;
    assert_eq!(results["summary"]["unanswered_count"], 1);
    let breakdown = results["breakdown"].as_array().unwrap();
    assert_eq!(breakdown[1]["points_awarded"], 0);
    assert!(breakdown[1]["is_correct"].is_null());
    assert_eq!(breakdown[1]["pending_manual_grade"], false);
}

#[tokio::test]
async fn true_false_and_multiple_answers_follow_their_type_rules() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-mixed", 1, 50.0, 6)).await;
    seed_question_with_options(
        &store,
        "exam-mixed",
        "q-tf",
        QuestionType::TrueFalse,
        2,
        1,
        &["True", "False"],
        &["True"],
    )
    .await;
    seed_question_with_options(
        &store,
        "exam-mixed",
        "q-ma",
        QuestionType::MultipleAnswers,
        4,
        2,
        &["A", "B", "C", "D"],
        &["A", "C"],
    )
    .await;

    // Exact set, submitted out of order: full credit.
    let attempt_id = start_attempt(&app, "exam-mixed", "student-1").await;
    submit_option(&app, &attempt_id, "q-tf", "True").await;
    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        json!({
            "question_id": "q-ma",
            "option_ids": [option_id("q-ma", "C"), option_id("q-ma", "A")],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = complete_attempt(&app, &attempt_id).await;
    assert_eq!(body["score"], 6);
    assert_eq!(body["percentage"].as_f64().unwrap(), 100.0);

    // A strict subset earns nothing: no partial credit.
    let attempt_id = start_attempt(&app, "exam-mixed", "student-2").await;
    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        json!({ "question_id": "q-ma", "option_ids": [option_id("q-ma", "A")] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = complete_attempt(&app, &attempt_id).await;
    assert_eq!(body["answers"]["q-ma"]["is_correct"], false);
    assert_eq!(body["answers"]["q-ma"]["points_awarded"], 0);
}

#[tokio::test]
async fn submitting_a_foreign_question_or_option_is_rejected() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-a", 1, 60.0, 5)).await;
    store.insert_exam(published_exam("exam-b", 1, 60.0, 5)).await;
    seed_choice_question(&store, "exam-a", "qa", 5, 1, "A").await;
    seed_choice_question(&store, "exam-b", "qb", 5, 1, "A").await;

    let attempt_id = start_attempt(&app, "exam-a", "student-1").await;

    // Question from another exam.
    let (status, body) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        json!({ "question_id": "qb", "option_id": option_id("qb", "A") }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("does not belong"));

    // Option from another question.
    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        json!({ "question_id": "qa", "option_id": option_id("qb", "A") }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Nothing was recorded.
    let body = complete_attempt(&app, &attempt_id).await;
    assert_eq!(body["answers"].as_object().unwrap().len(), 0);
}

#[tokio::test]
async fn terminal_attempts_reject_further_operations() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 3, 60.0, 5)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;
    complete_attempt(&app, &attempt_id).await;

    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        json!({ "question_id": "q1", "option_id": option_id("q1", "B") }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/complete", attempt_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/abandon", attempt_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn abandon_is_terminal_and_skips_grading() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 5)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;
    submit_option(&app, &attempt_id, "q1", "B").await;

    let (status, body) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/abandon", attempt_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "abandoned");
    assert_eq!(body["score"], 0);
    assert!(body["answers"]["q1"]["is_correct"].is_null());

    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/complete", attempt_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Abandonment does not burn a completed attempt; a new start works
    // and produces a fresh row.
    let new_id = start_attempt(&app, "exam-basic", "student-1").await;
    assert_ne!(new_id, attempt_id);
}

#[tokio::test]
async fn attempt_cap_blocks_starts_once_reached() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-capped", 1, 60.0, 5)).await;
    seed_choice_question(&store, "exam-capped", "q1", 5, 1, "B").await;

    let attempt_id = start_attempt(&app, "exam-capped", "student-1").await;
    complete_attempt(&app, &attempt_id).await;

    let (status, body) = post_json(
        &app,
        "/api/v1/exams/exam-capped/attempts",
        json!({ "student_id": "student-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "max attempts reached");

    // Another student is unaffected.
    start_attempt(&app, "exam-capped", "student-2").await;
}

#[tokio::test]
async fn a_new_attempt_is_created_while_attempts_remain() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 5)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let first = start_attempt(&app, "exam-basic", "student-1").await;
    complete_attempt(&app, &first).await;

    let (status, body) = post_json(
        &app,
        "/api/v1/exams/exam-basic/attempts",
        json!({ "student_id": "student-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(body["_id"].as_str().unwrap(), first);
}

#[tokio::test]
async fn unpublished_or_out_of_window_exams_are_not_available() {
    let (app, store) = create_test_app().await;

    let mut draft = published_exam("exam-draft", 2, 60.0, 5);
    draft.status = ExamStatus::Draft;
    store.insert_exam(draft).await;

    let mut over = published_exam("exam-over", 2, 60.0, 5);
    over.start_date = Utc::now() - Duration::hours(3);
    over.end_date = Utc::now() - Duration::hours(1);
    store.insert_exam(over).await;

    for exam_id in ["exam-draft", "exam-over"] {
        let (status, body) = post_json(
            &app,
            &format!("/api/v1/exams/{}/attempts", exam_id),
            json!({ "student_id": "student-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["reason"], "not available");
    }
}

#[tokio::test]
async fn class_bound_exams_require_enrollment() {
    let (app, store) = create_test_app().await;

    let mut exam = published_exam("exam-class", 2, 60.0, 5);
    exam.class_id = Some("class-7".to_string());
    store.insert_exam(exam).await;
    seed_choice_question(&store, "exam-class", "q1", 5, 1, "A").await;

    let (status, body) = post_json(
        &app,
        "/api/v1/exams/exam-class/attempts",
        json!({ "student_id": "student-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not enrolled");

    store.enroll("class-7", "student-1").await;
    start_attempt(&app, "exam-class", "student-1").await;
}

#[tokio::test]
async fn completion_honours_the_time_spent_override() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 5)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;
    let (status, body) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/complete", attempt_id),
        json!({ "time_spent_seconds": 120 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["time_spent_seconds"], 120);
}

#[tokio::test]
async fn unknown_ids_return_not_found() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 5)).await;

    let (status, _) = post_json(
        &app,
        "/api/v1/exams/exam-missing/attempts",
        json!({ "student_id": "student-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(
        &app,
        "/api/v1/attempts/attempt-missing/answers",
        json!({ "question_id": "q1" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&app, "/api/v1/attempts/attempt-missing/results").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_any_mutation() {
    let (app, store) = create_test_app().await;
    store.insert_exam(published_exam("exam-basic", 2, 60.0, 5)).await;
    seed_choice_question(&store, "exam-basic", "q1", 5, 1, "B").await;

    let (status, _) = post_json(
        &app,
        "/api/v1/exams/exam-basic/attempts",
        json!({ "student_id": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let attempt_id = start_attempt(&app, "exam-basic", "student-1").await;
    let (status, _) = post_json(
        &app,
        &format!("/api/v1/attempts/{}/answers", attempt_id),
        json!({ "question_id": "q1", "time_spent_seconds": -5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
