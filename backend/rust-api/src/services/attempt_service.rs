use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::ExamError;
use crate::metrics::{record_attempt_event, ANSWERS_SUBMITTED_TOTAL, ATTEMPTS_ACTIVE};
use crate::models::{
    attempt::{
        Attempt, AttemptAnswer, AttemptResults, AttemptStatus, QuestionResult, ResultSummary,
        SubmitAnswerRequest,
    },
    Exam, QuestionSnapshot,
};
use crate::store::{AttemptStore, ExamCatalog, StartOutcome};

use super::{eligibility, grading, scoring};

/// Result of a start request: either a freshly created attempt or a
/// resumed in_progress one. "Already started" is not an error.
#[derive(Debug)]
pub struct StartedAttempt {
    pub attempt: Attempt,
    pub resumed: bool,
}

/// Owns the attempt lifecycle: creation, answer recording, completion
/// and abandonment. The sole writer of attempt state; everything else
/// reads.
pub struct AttemptService {
    catalog: Arc<dyn ExamCatalog>,
    attempts: Arc<dyn AttemptStore>,
}

impl AttemptService {
    pub fn new(catalog: Arc<dyn ExamCatalog>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { catalog, attempts }
    }

    pub async fn start_exam(
        &self,
        exam_id: &str,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StartedAttempt, ExamError> {
        // Resume before anything else: an in-flight attempt is returned
        // unchanged even if the exam window has since closed.
        if let Some(existing) = self.attempts.find_in_progress(exam_id, student_id).await? {
            tracing::info!(
                "Resuming in_progress attempt {} for exam={}, student={}",
                existing.id,
                exam_id,
                student_id
            );
            record_attempt_event("resumed");
            return Ok(StartedAttempt {
                attempt: existing,
                resumed: true,
            });
        }

        let exam = self
            .catalog
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| ExamError::not_found(format!("exam {}", exam_id)))?;

        let completed = self.attempts.count_completed(exam_id, student_id).await?;
        let enrolled = match exam.class_id.as_deref() {
            Some(class_id) => self.catalog.student_in_class(class_id, student_id).await?,
            None => true,
        };

        eligibility::can_start(&exam, completed, enrolled, now).map_err(ExamError::Ineligible)?;

        let attempt = Attempt::new(exam_id, student_id, now);
        match self.attempts.insert_in_progress(attempt).await? {
            StartOutcome::Created(attempt) => {
                tracing::info!(
                    "Started attempt {} for exam={}, student={}",
                    attempt.id,
                    exam_id,
                    student_id
                );
                record_attempt_event("started");
                ATTEMPTS_ACTIVE.inc();
                Ok(StartedAttempt {
                    attempt,
                    resumed: false,
                })
            }
            StartOutcome::Existing(attempt) => {
                // Lost a concurrent-start race; the store's uniqueness
                // arbitration hands back the winner's row.
                tracing::info!(
                    "Concurrent start for exam={}, student={} resumed attempt {}",
                    exam_id,
                    student_id,
                    attempt.id
                );
                record_attempt_event("resumed");
                Ok(StartedAttempt {
                    attempt,
                    resumed: true,
                })
            }
        }
    }

    /// Records an answer without grading it. Submission is pure
    /// recording; correctness and points are computed at completion.
    pub async fn submit_answer(
        &self,
        attempt_id: &str,
        req: &SubmitAnswerRequest,
        now: DateTime<Utc>,
    ) -> Result<AttemptAnswer, ExamError> {
        let attempt = self.require_attempt(attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(ExamError::invalid_state(format!(
                "attempt {} is {}; answers can only be submitted while in_progress",
                attempt.id,
                attempt.status.as_str()
            )));
        }

        let snapshots = self.catalog.exam_questions(&attempt.exam_id).await?;
        let snapshot = snapshots
            .iter()
            .find(|s| s.question.id == req.question_id)
            .ok_or_else(|| {
                ExamError::invalid_question(format!(
                    "question {} does not belong to exam {}",
                    req.question_id, attempt.exam_id
                ))
            })?;

        let selection = req.selection();
        for option_id in &selection {
            if !snapshot.has_option(option_id) {
                return Err(ExamError::invalid_question(format!(
                    "option {} does not belong to question {}",
                    option_id, req.question_id
                )));
            }
        }

        let answer = AttemptAnswer {
            id: AttemptAnswer::answer_id(&attempt.id, &snapshot.question.id),
            question_id: snapshot.question.id.clone(),
            selected_option_ids: selection,
            answer_text: req.answer_text.clone(),
            is_correct: None,
            points_awarded: 0,
            time_spent_seconds: req.time_spent_seconds.unwrap_or(0),
            feedback: None,
            submitted_at: now,
        };

        self.attempts.upsert_answer(&attempt.id, &answer).await?;

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[snapshot.question.question_type.as_str()])
            .inc();
        tracing::debug!(
            "Recorded answer for attempt={}, question={}",
            attempt.id,
            answer.question_id
        );

        Ok(answer)
    }

    /// Grades every answer, aggregates the score and flips the attempt
    /// to completed in one status-guarded document replace: either the
    /// fully-graded attempt lands or nothing changes.
    pub async fn complete_exam(
        &self,
        attempt_id: &str,
        time_spent_override: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Attempt, ExamError> {
        let mut attempt = self.require_attempt(attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(ExamError::invalid_state(format!(
                "attempt {} is already {}",
                attempt.id,
                attempt.status.as_str()
            )));
        }

        let exam = self.require_exam(&attempt.exam_id).await?;
        let snapshots = self.catalog.exam_questions(&attempt.exam_id).await?;

        grading::grade_all(&snapshots, &mut attempt.answers);

        let total = scoring::effective_total_points(&exam.id, exam.total_points, &snapshots);
        let summary = scoring::calculate(&attempt.answers, total);
        attempt.score = summary.score;
        attempt.percentage = summary.percentage;
        attempt.time_spent_seconds = time_spent_override
            .unwrap_or_else(|| (now - attempt.started_at).num_seconds().max(0));
        attempt.status = AttemptStatus::Completed;
        attempt.completed_at = Some(now);

        if !self.attempts.finalize_if_in_progress(&attempt).await? {
            return Err(ExamError::invalid_state(format!(
                "attempt {} was finalized concurrently",
                attempt.id
            )));
        }

        record_attempt_event("completed");
        ATTEMPTS_ACTIVE.dec();
        tracing::info!(
            "Completed attempt {}: score={}, percentage={:.1}",
            attempt.id,
            attempt.score,
            attempt.percentage
        );

        Ok(attempt)
    }

    /// Domain-level cancellation: terminal, no grading, always allowed
    /// while in_progress.
    pub async fn abandon_exam(
        &self,
        attempt_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Attempt, ExamError> {
        let mut attempt = self.require_attempt(attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(ExamError::invalid_state(format!(
                "attempt {} is already {}",
                attempt.id,
                attempt.status.as_str()
            )));
        }

        attempt.status = AttemptStatus::Abandoned;
        attempt.completed_at = Some(now);
        attempt.time_spent_seconds = (now - attempt.started_at).num_seconds().max(0);

        if !self.attempts.finalize_if_in_progress(&attempt).await? {
            return Err(ExamError::invalid_state(format!(
                "attempt {} was finalized concurrently",
                attempt.id
            )));
        }

        record_attempt_event("abandoned");
        ATTEMPTS_ACTIVE.dec();
        tracing::info!("Abandoned attempt {}", attempt.id);

        Ok(attempt)
    }

    /// Read-only view of an attempt with a per-question breakdown, in
    /// question order. Readable any number of times in any state; a
    /// still-running attempt simply shows everything ungraded.
    pub async fn results(&self, attempt_id: &str) -> Result<AttemptResults, ExamError> {
        let attempt = self.require_attempt(attempt_id).await?;
        let exam = self.require_exam(&attempt.exam_id).await?;
        let snapshots = self.catalog.exam_questions(&attempt.exam_id).await?;

        let breakdown: Vec<QuestionResult> = snapshots
            .iter()
            .map(|snapshot| question_result(snapshot, attempt.answers.get(&snapshot.question.id)))
            .collect();

        let total = scoring::effective_total_points(&exam.id, exam.total_points, &snapshots);
        let answered = attempt.answers.len() as u32;
        let correct_count = count_where(&attempt, |a| a.is_correct == Some(true));
        let incorrect_count = count_where(&attempt, |a| a.is_correct == Some(false));

        let summary = ResultSummary {
            score: attempt.score,
            total_points: total,
            percentage: attempt.percentage,
            passed: scoring::has_passed(attempt.percentage, exam.passing_score),
            correct_count,
            incorrect_count,
            pending_count: answered.saturating_sub(correct_count + incorrect_count),
            unanswered_count: (snapshots.len() as u32).saturating_sub(answered),
            time_spent_seconds: attempt.time_spent_seconds,
        };

        Ok(AttemptResults {
            attempt,
            breakdown,
            summary,
        })
    }

    async fn require_attempt(&self, attempt_id: &str) -> Result<Attempt, ExamError> {
        self.attempts
            .find_attempt(attempt_id)
            .await?
            .ok_or_else(|| ExamError::not_found(format!("attempt {}", attempt_id)))
    }

    async fn require_exam(&self, exam_id: &str) -> Result<Exam, ExamError> {
        self.catalog
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| ExamError::not_found(format!("exam {}", exam_id)))
    }
}

fn count_where(attempt: &Attempt, pred: impl Fn(&AttemptAnswer) -> bool) -> u32 {
    attempt.answers.values().filter(|a| pred(a)).count() as u32
}

fn question_result(snapshot: &QuestionSnapshot, answer: Option<&AttemptAnswer>) -> QuestionResult {
    let selected_option_keys = answer
        .map(|a| {
            a.selected_option_ids
                .iter()
                .filter_map(|id| snapshot.option_key(id))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    QuestionResult {
        question_id: snapshot.question.id.clone(),
        question_text: snapshot.question.text.clone(),
        question_type: snapshot.question.question_type,
        max_points: snapshot.question.points,
        selected_option_keys,
        answer_text: answer.and_then(|a| a.answer_text.clone()),
        is_correct: answer.and_then(|a| a.is_correct),
        points_awarded: answer.map(|a| a.points_awarded).unwrap_or(0),
        pending_manual_grade: answer.is_some_and(|a| {
            a.is_correct.is_none() && !snapshot.question.question_type.is_auto_graded()
        }),
        feedback: answer.and_then(|a| a.feedback.clone()),
    }
}
