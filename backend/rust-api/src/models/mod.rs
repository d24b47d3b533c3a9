use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod attempt;
pub mod statistics;

/// Exam metadata as authored. The attempt engine reads these rows but
/// never writes them; the authoring subsystem owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    /// When set, starting the exam requires class membership.
    pub class_id: Option<String>,
    pub status: ExamStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub max_attempts: u32,
    /// Percentage threshold for passing, 0..=100.
    pub passing_score: f64,
    /// Denormalized sum of question points, kept in sync by the
    /// authoring side. Completion re-derives it from the questions and
    /// trusts its own sum on mismatch.
    pub total_points: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    Draft,
    Published,
    Ongoing,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    MultipleAnswers,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::MultipleAnswers => "multiple_answers",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Essay => "essay",
        }
    }

    /// Objective types are graded by comparing the submitted selection
    /// to the designated correct set; the rest wait for a human.
    pub fn is_auto_graded(&self) -> bool {
        matches!(
            self,
            QuestionType::MultipleChoice | QuestionType::MultipleAnswers | QuestionType::TrueFalse
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    /// None means the question sits in the bank, assigned to no exam.
    pub exam_id: Option<String>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub points: i64,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_id: String,
    /// Display label, e.g. "A".
    pub key: String,
    pub text: String,
    pub order: i32,
}

/// One designated correct answer for a question. Option-backed types
/// carry `option_id`; text types carry `answer_text`. A question may
/// have zero (manual-grade types), one, or many rows (multiple_answers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectAnswer {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_id: String,
    pub option_id: Option<String>,
    pub answer_text: Option<String>,
}

/// Fully-materialized view of one question: everything grading and
/// result rendering need, resolved up front instead of walking live
/// object graphs per answer.
#[derive(Debug, Clone)]
pub struct QuestionSnapshot {
    pub question: Question,
    pub options: Vec<AnswerOption>,
    pub correct_option_ids: Vec<String>,
    pub correct_text: Option<String>,
}

impl QuestionSnapshot {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    pub fn option_key(&self, option_id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.key.as_str())
    }
}
