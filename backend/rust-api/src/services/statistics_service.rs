use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExamError;
use crate::models::{
    attempt::Attempt,
    statistics::{ExamStatistics, StudentStatistics},
};
use crate::store::{AttemptStore, ExamCatalog};

use super::scoring;

/// Read-only aggregations over completed attempts. No caching; every
/// request recomputes from the rows it reads.
pub struct StatisticsService {
    catalog: Arc<dyn ExamCatalog>,
    attempts: Arc<dyn AttemptStore>,
}

impl StatisticsService {
    pub fn new(catalog: Arc<dyn ExamCatalog>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { catalog, attempts }
    }

    pub async fn exam_statistics(&self, exam_id: &str) -> Result<ExamStatistics, ExamError> {
        let exam = self
            .catalog
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| ExamError::not_found(format!("exam {}", exam_id)))?;

        let completed = self.attempts.completed_for_exam(exam_id).await?;
        let count = completed.len() as u64;
        if count == 0 {
            return Ok(ExamStatistics {
                exam_id: exam_id.to_string(),
                attempts_completed: 0,
                average_score: 0.0,
                min_score: 0,
                max_score: 0,
                average_percentage: 0.0,
                pass_rate: 0.0,
                average_time_spent_seconds: 0.0,
            });
        }

        let passed = completed
            .iter()
            .filter(|a| scoring::has_passed(a.percentage, exam.passing_score))
            .count() as u64;

        Ok(ExamStatistics {
            exam_id: exam_id.to_string(),
            attempts_completed: count,
            average_score: mean(completed.iter().map(|a| a.score as f64)),
            min_score: completed.iter().map(|a| a.score).min().unwrap_or(0),
            max_score: completed.iter().map(|a| a.score).max().unwrap_or(0),
            average_percentage: mean(completed.iter().map(|a| a.percentage)),
            pass_rate: passed as f64 / count as f64,
            average_time_spent_seconds: mean(
                completed.iter().map(|a| a.time_spent_seconds as f64),
            ),
        })
    }

    pub async fn student_statistics(
        &self,
        student_id: &str,
    ) -> Result<StudentStatistics, ExamError> {
        let completed = self.attempts.completed_for_student(student_id).await?;

        if completed.is_empty() {
            return Ok(StudentStatistics {
                student_id: student_id.to_string(),
                exams_attempted: 0,
                attempts_completed: 0,
                average_percentage: 0.0,
                passed_count: 0,
                failed_count: 0,
                total_time_spent_seconds: 0,
            });
        }

        // Pass/fail needs each exam's threshold; resolve every distinct
        // exam once.
        let mut thresholds: HashMap<String, f64> = HashMap::new();
        for attempt in &completed {
            if !thresholds.contains_key(&attempt.exam_id) {
                let exam = self
                    .catalog
                    .find_exam(&attempt.exam_id)
                    .await?
                    .ok_or_else(|| ExamError::not_found(format!("exam {}", attempt.exam_id)))?;
                thresholds.insert(attempt.exam_id.clone(), exam.passing_score);
            }
        }

        let passed = completed
            .iter()
            .filter(|a| has_passed_with(&thresholds, a))
            .count() as u64;
        let count = completed.len() as u64;

        Ok(StudentStatistics {
            student_id: student_id.to_string(),
            exams_attempted: thresholds.len() as u64,
            attempts_completed: count,
            average_percentage: mean(completed.iter().map(|a| a.percentage)),
            passed_count: passed,
            failed_count: count - passed,
            total_time_spent_seconds: completed.iter().map(|a| a.time_spent_seconds).sum(),
        })
    }
}

fn has_passed_with(thresholds: &HashMap<String, f64>, attempt: &Attempt) -> bool {
    thresholds
        .get(&attempt.exam_id)
        .is_some_and(|threshold| scoring::has_passed(attempt.percentage, *threshold))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u64), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
