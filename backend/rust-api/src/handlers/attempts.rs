use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ExamError,
    extractors::AppJson,
    models::attempt::{CompleteAttemptRequest, StartAttemptRequest, SubmitAnswerRequest},
    services::{attempt_service::AttemptService, AppState},
};

pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
    AppJson(req): AppJson<StartAttemptRequest>,
) -> Result<impl IntoResponse, ExamError> {
    req.validate()?;
    tracing::info!(
        "Start requested for exam_id={}, student_id={}",
        exam_id,
        req.student_id
    );

    let service = AttemptService::new(state.catalog.clone(), state.attempts.clone());
    let started = service
        .start_exam(&exam_id, &req.student_id, Utc::now())
        .await?;

    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started.attempt)))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ExamError> {
    req.validate()?;
    tracing::info!(
        "Answer submission for attempt={}, question={}",
        attempt_id,
        req.question_id
    );

    let service = AttemptService::new(state.catalog.clone(), state.attempts.clone());
    let answer = service.submit_answer(&attempt_id, &req, Utc::now()).await?;

    Ok((StatusCode::OK, Json(answer)))
}

pub async fn complete_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<CompleteAttemptRequest>,
) -> Result<impl IntoResponse, ExamError> {
    req.validate()?;
    tracing::info!("Completing attempt: {}", attempt_id);

    let service = AttemptService::new(state.catalog.clone(), state.attempts.clone());
    let attempt = service
        .complete_exam(&attempt_id, req.time_spent_seconds, Utc::now())
        .await?;

    Ok((StatusCode::OK, Json(attempt)))
}

pub async fn abandon_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ExamError> {
    tracing::info!("Abandoning attempt: {}", attempt_id);

    let service = AttemptService::new(state.catalog.clone(), state.attempts.clone());
    let attempt = service.abandon_exam(&attempt_id, Utc::now()).await?;

    Ok((StatusCode::OK, Json(attempt)))
}

pub async fn attempt_results(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ExamError> {
    let service = AttemptService::new(state.catalog.clone(), state.attempts.clone());
    let results = service.results(&attempt_id).await?;

    Ok((StatusCode::OK, Json(results)))
}
