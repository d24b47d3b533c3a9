use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ExamError,
    services::{statistics_service::StatisticsService, AppState},
};

pub async fn exam_statistics(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, ExamError> {
    let service = StatisticsService::new(state.catalog.clone(), state.attempts.clone());
    let stats = service.exam_statistics(&exam_id).await?;

    Ok((StatusCode::OK, Json(stats)))
}

pub async fn student_statistics(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, ExamError> {
    let service = StatisticsService::new(state.catalog.clone(), state.attempts.clone());
    let stats = service.student_statistics(&student_id).await?;

    Ok((StatusCode::OK, Json(stats)))
}
