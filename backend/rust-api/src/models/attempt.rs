use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::QuestionType;

/// One student's run through an exam. Answers are embedded, keyed by
/// question id, so the (attempt, question) upsert is a single-slot
/// write and finalization is a single-document replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub percentage: f64,
    pub time_spent_seconds: i64,
    #[serde(default)]
    pub answers: BTreeMap<String, AttemptAnswer>,
}

impl Attempt {
    pub fn new(exam_id: &str, student_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            status: AttemptStatus::InProgress,
            started_at: now,
            completed_at: None,
            score: 0,
            percentage: 0.0,
            time_spent_seconds: 0,
            answers: BTreeMap::new(),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

/// The recorded response to one question within one attempt.
/// `is_correct == None` means ungraded: either the attempt is still
/// running, or the question type requires manual grading.
///
/// The id is `<attempt_id>:<question_id>`; resubmission overwrites the
/// slot and keeps the id stable for later manual grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub id: String,
    pub question_id: String,
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    pub answer_text: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: i64,
    pub time_spent_seconds: i64,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl AttemptAnswer {
    pub fn answer_id(attempt_id: &str, question_id: &str) -> String {
        format!("{}:{}", attempt_id, question_id)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub student_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub question_id: String,
    /// Single-select form of the payload.
    pub option_id: Option<String>,
    /// Multi-select form; merged with `option_id` on read.
    pub option_ids: Option<Vec<String>>,
    pub answer_text: Option<String>,
    #[validate(range(min = 0, message = "time_spent_seconds must not be negative"))]
    pub time_spent_seconds: Option<i64>,
}

impl SubmitAnswerRequest {
    /// Merged selection, first-seen order, duplicates removed.
    pub fn selection(&self) -> Vec<String> {
        let mut merged: Vec<String> = Vec::new();
        let single = self.option_id.iter();
        let many = self.option_ids.iter().flatten();
        for id in single.chain(many) {
            if !merged.iter().any(|seen| seen == id) {
                merged.push(id.clone());
            }
        }
        merged
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteAttemptRequest {
    /// Overrides the served-side elapsed-time computation when given.
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent_seconds must not be negative"))]
    pub time_spent_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GradeAnswerRequest {
    /// Clamped to [0, question.points] by the service.
    pub points: i64,
    #[validate(length(max = 2000, message = "feedback is limited to 2000 characters"))]
    pub feedback: Option<String>,
}

/// Per-question row of the results view, in question order.
#[derive(Debug, Serialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub question_text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub max_points: i64,
    pub selected_option_keys: Vec<String>,
    pub answer_text: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: i64,
    pub pending_manual_grade: bool,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub score: i64,
    pub total_points: i64,
    pub percentage: f64,
    pub passed: bool,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub pending_count: u32,
    pub unanswered_count: u32,
    pub time_spent_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct AttemptResults {
    pub attempt: Attempt,
    pub breakdown: Vec<QuestionResult>,
    pub summary: ResultSummary,
}
