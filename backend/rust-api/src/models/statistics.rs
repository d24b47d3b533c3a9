use serde::Serialize;

/// Aggregates over an exam's completed attempts. Abandoned and
/// in-progress attempts are excluded everywhere.
#[derive(Debug, Clone, Serialize)]
pub struct ExamStatistics {
    pub exam_id: String,
    pub attempts_completed: u64,
    pub average_score: f64,
    pub min_score: i64,
    pub max_score: i64,
    pub average_percentage: f64,
    /// Fraction of completed attempts at or above the passing score.
    pub pass_rate: f64,
    pub average_time_spent_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentStatistics {
    pub student_id: String,
    /// Distinct exams with at least one completed attempt.
    pub exams_attempted: u64,
    pub attempts_completed: u64,
    pub average_percentage: f64,
    pub passed_count: u64,
    pub failed_count: u64,
    pub total_time_spent_seconds: i64,
}
