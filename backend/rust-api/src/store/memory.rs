use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{
    attempt::{Attempt, AttemptAnswer, AttemptStatus},
    AnswerOption, CorrectAnswer, Exam, Question, QuestionSnapshot,
};

use super::{attempt_id_of_answer, AttemptStore, ExamCatalog, StartOutcome, StoreError};

#[derive(Default)]
struct Inner {
    exams: BTreeMap<String, Exam>,
    questions: BTreeMap<String, Question>,
    options: BTreeMap<String, AnswerOption>,
    correct_answers: BTreeMap<String, Vec<CorrectAnswer>>,
    /// class id -> enrolled student ids
    enrollments: BTreeMap<String, BTreeSet<String>>,
    attempts: BTreeMap<String, Attempt>,
}

/// In-memory store backing the integration tests and local tooling.
/// All invariants the Mongo store delegates to indexes are enforced
/// here under a single write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_exam(&self, exam: Exam) {
        self.inner.write().await.exams.insert(exam.id.clone(), exam);
    }

    pub async fn insert_question(&self, question: Question) {
        self.inner
            .write()
            .await
            .questions
            .insert(question.id.clone(), question);
    }

    pub async fn insert_option(&self, option: AnswerOption) {
        self.inner
            .write()
            .await
            .options
            .insert(option.id.clone(), option);
    }

    pub async fn insert_correct_answer(&self, correct: CorrectAnswer) {
        self.inner
            .write()
            .await
            .correct_answers
            .entry(correct.question_id.clone())
            .or_default()
            .push(correct);
    }

    pub async fn enroll(&self, class_id: &str, student_id: &str) {
        self.inner
            .write()
            .await
            .enrollments
            .entry(class_id.to_string())
            .or_default()
            .insert(student_id.to_string());
    }
}

#[async_trait]
impl ExamCatalog for MemoryStore {
    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError> {
        Ok(self.inner.read().await.exams.get(exam_id).cloned())
    }

    async fn exam_questions(&self, exam_id: &str) -> Result<Vec<QuestionSnapshot>, StoreError> {
        let inner = self.inner.read().await;

        let mut questions: Vec<Question> = inner
            .questions
            .values()
            .filter(|q| q.exam_id.as_deref() == Some(exam_id))
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);

        let snapshots = questions
            .into_iter()
            .map(|question| {
                let mut options: Vec<AnswerOption> = inner
                    .options
                    .values()
                    .filter(|o| o.question_id == question.id)
                    .cloned()
                    .collect();
                options.sort_by_key(|o| o.order);

                let correct = inner.correct_answers.get(&question.id);
                let correct_option_ids = correct
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|c| c.option_id.clone())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let correct_text = correct
                    .and_then(|rows| rows.iter().find_map(|c| c.answer_text.clone()));

                QuestionSnapshot {
                    question,
                    options,
                    correct_option_ids,
                    correct_text,
                }
            })
            .collect();

        Ok(snapshots)
    }

    async fn student_in_class(
        &self,
        class_id: &str,
        student_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .enrollments
            .get(class_id)
            .is_some_and(|students| students.contains(student_id)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn find_in_progress(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .attempts
            .values()
            .find(|a| {
                a.exam_id == exam_id && a.student_id == student_id && a.is_in_progress()
            })
            .cloned())
    }

    async fn insert_in_progress(&self, attempt: Attempt) -> Result<StartOutcome, StoreError> {
        let mut inner = self.inner.write().await;

        // Uniqueness is decided under this write lock; two concurrent
        // starts serialize here and the loser resumes the winner's row.
        let existing = inner
            .attempts
            .values()
            .find(|a| {
                a.exam_id == attempt.exam_id
                    && a.student_id == attempt.student_id
                    && a.is_in_progress()
            })
            .cloned();

        if let Some(existing) = existing {
            return Ok(StartOutcome::Existing(existing));
        }

        inner.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(StartOutcome::Created(attempt))
    }

    async fn find_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>, StoreError> {
        Ok(self.inner.read().await.attempts.get(attempt_id).cloned())
    }

    async fn find_attempt_by_answer(
        &self,
        answer_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let Some(attempt_id) = attempt_id_of_answer(answer_id) else {
            return Ok(None);
        };

        let attempt = self.inner.read().await.attempts.get(attempt_id).cloned();
        Ok(attempt.filter(|a| a.answers.values().any(|ans| ans.id == answer_id)))
    }

    async fn upsert_answer(
        &self,
        attempt_id: &str,
        answer: &AttemptAnswer,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let attempt = inner
            .attempts
            .get_mut(attempt_id)
            .ok_or_else(|| StoreError::Backend(format!("attempt {} vanished", attempt_id)))?;

        attempt
            .answers
            .insert(answer.question_id.clone(), answer.clone());
        Ok(())
    }

    async fn finalize_if_in_progress(&self, attempt: &Attempt) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.attempts.get_mut(&attempt.id) {
            Some(stored) if stored.is_in_progress() => {
                *stored = attempt.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::Backend(format!(
                "attempt {} vanished during finalize",
                attempt.id
            ))),
        }
    }

    async fn update_graded(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.attempts.get_mut(&attempt.id) {
            Some(stored) => {
                *stored = attempt.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "attempt {} vanished during grading",
                attempt.id
            ))),
        }
    }

    async fn count_completed(&self, exam_id: &str, student_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .attempts
            .values()
            .filter(|a| {
                a.exam_id == exam_id
                    && a.student_id == student_id
                    && a.status == AttemptStatus::Completed
            })
            .count() as u64)
    }

    async fn completed_for_exam(&self, exam_id: &str) -> Result<Vec<Attempt>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .attempts
            .values()
            .filter(|a| a.exam_id == exam_id && a.status == AttemptStatus::Completed)
            .cloned()
            .collect())
    }

    async fn completed_for_student(&self, student_id: &str) -> Result<Vec<Attempt>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .attempts
            .values()
            .filter(|a| a.student_id == student_id && a.status == AttemptStatus::Completed)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
