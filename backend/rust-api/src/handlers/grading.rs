use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ExamError,
    extractors::AppJson,
    models::attempt::GradeAnswerRequest,
    services::{grading_service::GradingService, AppState},
};

pub async fn grade_answer(
    State(state): State<Arc<AppState>>,
    Path(answer_id): Path<String>,
    AppJson(req): AppJson<GradeAnswerRequest>,
) -> Result<impl IntoResponse, ExamError> {
    req.validate()?;
    tracing::info!(
        "Manual grade for answer={}: {} points",
        answer_id,
        req.points
    );

    let service = GradingService::new(state.catalog.clone(), state.attempts.clone());
    let answer = service
        .grade_answer(&answer_id, req.points, req.feedback)
        .await?;

    Ok((StatusCode::OK, Json(answer)))
}
