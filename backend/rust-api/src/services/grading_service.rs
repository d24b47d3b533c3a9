use std::sync::Arc;

use crate::error::ExamError;
use crate::metrics::MANUAL_GRADES_TOTAL;
use crate::models::attempt::{AttemptAnswer, AttemptStatus};
use crate::store::{AttemptStore, ExamCatalog};

use super::{grading::ManualGradePolicy, scoring};

/// Manual grading: a grader assigns points to an answer after the
/// attempt completed. Typically short_answer/essay, but any answer
/// can be overridden. Each grade re-aggregates the owning attempt's
/// score from scratch, so a completed attempt's pass/fail outcome can
/// change after the fact.
pub struct GradingService {
    catalog: Arc<dyn ExamCatalog>,
    attempts: Arc<dyn AttemptStore>,
    policy: ManualGradePolicy,
}

impl GradingService {
    pub fn new(catalog: Arc<dyn ExamCatalog>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self {
            catalog,
            attempts,
            policy: ManualGradePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ManualGradePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn grade_answer(
        &self,
        answer_id: &str,
        points: i64,
        feedback: Option<String>,
    ) -> Result<AttemptAnswer, ExamError> {
        let mut attempt = self
            .attempts
            .find_attempt_by_answer(answer_id)
            .await?
            .ok_or_else(|| ExamError::not_found(format!("answer {}", answer_id)))?;

        // Completion re-grades every answer from scratch and would
        // silently wipe a manual grade applied to a running attempt.
        if attempt.status != AttemptStatus::Completed {
            return Err(ExamError::invalid_state(format!(
                "attempt {} is {}; manual grading applies to completed attempts",
                attempt.id,
                attempt.status.as_str()
            )));
        }

        let question_id = attempt
            .answers
            .values()
            .find(|a| a.id == answer_id)
            .map(|a| a.question_id.clone())
            .ok_or_else(|| ExamError::not_found(format!("answer {}", answer_id)))?;

        let exam = self
            .catalog
            .find_exam(&attempt.exam_id)
            .await?
            .ok_or_else(|| ExamError::not_found(format!("exam {}", attempt.exam_id)))?;
        let snapshots = self.catalog.exam_questions(&attempt.exam_id).await?;
        let snapshot = snapshots
            .iter()
            .find(|s| s.question.id == question_id)
            .ok_or_else(|| ExamError::not_found(format!("question {}", question_id)))?;

        let max_points = snapshot.question.points;
        let awarded = ManualGradePolicy::clamp(points, max_points);
        if awarded != points {
            tracing::warn!(
                "Clamped manual grade for answer {} from {} to {} (max {})",
                answer_id,
                points,
                awarded,
                max_points
            );
        }
        let is_correct = self.policy.is_correct(awarded, max_points);

        let updated = {
            let answer = attempt
                .answers
                .get_mut(&question_id)
                .ok_or_else(|| ExamError::not_found(format!("answer {}", answer_id)))?;
            answer.points_awarded = awarded;
            answer.is_correct = Some(is_correct);
            answer.feedback = feedback;
            answer.clone()
        };

        let total = scoring::effective_total_points(&exam.id, exam.total_points, &snapshots);
        let summary = scoring::calculate(&attempt.answers, total);
        attempt.score = summary.score;
        attempt.percentage = summary.percentage;

        self.attempts.update_graded(&attempt).await?;

        MANUAL_GRADES_TOTAL
            .with_label_values(&[snapshot.question.question_type.as_str()])
            .inc();
        tracing::info!(
            "Manually graded answer {}: {} points, attempt {} now at {:.1}%",
            answer_id,
            awarded,
            attempt.id,
            attempt.percentage
        );

        Ok(updated)
    }
}
