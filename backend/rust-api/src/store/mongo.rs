use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};

use crate::models::{
    attempt::{Attempt, AttemptAnswer, AttemptStatus},
    AnswerOption, CorrectAnswer, Exam, Question, QuestionSnapshot,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

use super::{attempt_id_of_answer, AttemptStore, ExamCatalog, StartOutcome, StoreError};

/// MongoDB-backed store. Attempts embed their answers, so the
/// correctness-critical writes are all single-document operations; the
/// at-most-one-in-progress invariant lives in a partial unique index
/// rather than in application-level check-then-create.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn exams(&self) -> Collection<Exam> {
        self.db.collection("exams")
    }

    fn questions(&self) -> Collection<Question> {
        self.db.collection("questions")
    }

    fn options(&self) -> Collection<AnswerOption> {
        self.db.collection("question_options")
    }

    fn correct_answers(&self) -> Collection<CorrectAnswer> {
        self.db.collection("correct_answers")
    }

    fn classes(&self) -> Collection<Document> {
        self.db.collection("classes")
    }

    fn attempts(&self) -> Collection<Attempt> {
        self.db.collection("attempts")
    }

    /// Creates the partial unique index that arbitrates concurrent
    /// starts: at most one attempt per (exam, student) may carry
    /// status == in_progress.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "exam_id": 1, "student_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(
                        doc! { "status": AttemptStatus::InProgress.as_str() },
                    )
                    .build(),
            )
            .build();

        self.attempts()
            .create_index(index)
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

fn backend(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

#[async_trait]
impl ExamCatalog for MongoStore {
    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError> {
        retry_async_with_config(RetryConfig::default(), || async {
            self.exams().find_one(doc! { "_id": exam_id }).await
        })
        .await
        .map_err(backend)
    }

    async fn exam_questions(&self, exam_id: &str) -> Result<Vec<QuestionSnapshot>, StoreError> {
        let questions: Vec<Question> = retry_async_with_config(RetryConfig::default(), || async {
            let cursor = self
                .questions()
                .find(doc! { "exam_id": exam_id })
                .sort(doc! { "order": 1 })
                .await?;
            cursor.try_collect().await
        })
        .await
        .map_err(backend)?;

        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let question_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();

        let options: Vec<AnswerOption> = retry_async_with_config(RetryConfig::default(), || async {
            let cursor = self
                .options()
                .find(doc! { "question_id": { "$in": question_ids.clone() } })
                .sort(doc! { "order": 1 })
                .await?;
            cursor.try_collect().await
        })
        .await
        .map_err(backend)?;

        let correct: Vec<CorrectAnswer> = retry_async_with_config(RetryConfig::default(), || async {
            let cursor = self
                .correct_answers()
                .find(doc! { "question_id": { "$in": question_ids.clone() } })
                .await?;
            cursor.try_collect().await
        })
        .await
        .map_err(backend)?;

        let mut options_by_question: HashMap<String, Vec<AnswerOption>> = HashMap::new();
        for option in options {
            options_by_question
                .entry(option.question_id.clone())
                .or_default()
                .push(option);
        }

        let mut correct_by_question: HashMap<String, Vec<CorrectAnswer>> = HashMap::new();
        for row in correct {
            correct_by_question
                .entry(row.question_id.clone())
                .or_default()
                .push(row);
        }

        let snapshots = questions
            .into_iter()
            .map(|question| {
                let options = options_by_question.remove(&question.id).unwrap_or_default();
                let correct_rows = correct_by_question.remove(&question.id).unwrap_or_default();
                let correct_option_ids = correct_rows
                    .iter()
                    .filter_map(|c| c.option_id.clone())
                    .collect();
                let correct_text = correct_rows.iter().find_map(|c| c.answer_text.clone());

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
        let filter = doc! {
            "_id": class_id,
            "student_ids": student_id,
        };

        let count = retry_async_with_config(RetryConfig::default(), || async {
            self.classes().count_documents(filter.clone()).await
        })
        .await
        .map_err(backend)?;

        Ok(count > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

#[async_trait]
impl AttemptStore for MongoStore {
    async fn find_in_progress(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let filter = doc! {
            "exam_id": exam_id,
            "student_id": student_id,
            "status": AttemptStatus::InProgress.as_str(),
        };

        retry_async_with_config(RetryConfig::default(), || async {
            self.attempts().find_one(filter.clone()).await
        })
        .await
        .map_err(backend)
    }

    async fn insert_in_progress(&self, attempt: Attempt) -> Result<StartOutcome, StoreError> {
        // No retry here: a duplicate-key rejection is an expected
        // outcome (the partial unique index arbitrating a concurrent
        // start), not a transient fault.
        match self.attempts().insert_one(&attempt).await {
            Ok(_) => Ok(StartOutcome::Created(attempt)),
            Err(err) if is_duplicate_key(&err) => {
                let existing = self
                    .find_in_progress(&attempt.exam_id, &attempt.student_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Backend(
                            "in_progress attempt disappeared between conflict and re-read".into(),
                        )
                    })?;
                Ok(StartOutcome::Existing(existing))
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn find_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>, StoreError> {
        retry_async_with_config(RetryConfig::default(), || async {
            self.attempts().find_one(doc! { "_id": attempt_id }).await
        })
        .await
        .map_err(backend)
    }

    async fn find_attempt_by_answer(
        &self,
        answer_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let Some(attempt_id) = attempt_id_of_answer(answer_id) else {
            return Ok(None);
        };

        let attempt = self.find_attempt(attempt_id).await?;
        Ok(attempt.filter(|a| a.answers.values().any(|ans| ans.id == answer_id)))
    }

    async fn upsert_answer(
        &self,
        attempt_id: &str,
        answer: &AttemptAnswer,
    ) -> Result<(), StoreError> {
        let answer_bson = to_bson(answer).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut set = Document::new();
        set.insert(format!("answers.{}", answer.question_id), answer_bson);

        let result = retry_async_with_config(RetryConfig::aggressive(), || async {
            self.attempts()
                .update_one(doc! { "_id": attempt_id }, doc! { "$set": set.clone() })
                .await
        })
        .await
        .map_err(backend)?;

        if result.matched_count == 0 {
            return Err(StoreError::Backend(format!(
                "attempt {} vanished",
                attempt_id
            )));
        }
        Ok(())
    }

    async fn finalize_if_in_progress(&self, attempt: &Attempt) -> Result<bool, StoreError> {
        let filter = doc! {
            "_id": &attempt.id,
            "status": AttemptStatus::InProgress.as_str(),
        };

        let result = retry_async_with_config(RetryConfig::aggressive(), || async {
            self.attempts().replace_one(filter.clone(), attempt).await
        })
        .await
        .map_err(backend)?;

        Ok(result.matched_count == 1)
    }

    async fn update_graded(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let result = retry_async_with_config(RetryConfig::aggressive(), || async {
            self.attempts()
                .replace_one(doc! { "_id": &attempt.id }, attempt)
                .await
        })
        .await
        .map_err(backend)?;

        if result.matched_count == 0 {
            return Err(StoreError::Backend(format!(
                "attempt {} vanished during grading",
                attempt.id
            )));
        }
        Ok(())
    }

    async fn count_completed(&self, exam_id: &str, student_id: &str) -> Result<u64, StoreError> {
        let filter = doc! {
            "exam_id": exam_id,
            "student_id": student_id,
            "status": AttemptStatus::Completed.as_str(),
        };

        retry_async_with_config(RetryConfig::default(), || async {
            self.attempts().count_documents(filter.clone()).await
        })
        .await
        .map_err(backend)
    }

    async fn completed_for_exam(&self, exam_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let filter = doc! {
            "exam_id": exam_id,
            "status": AttemptStatus::Completed.as_str(),
        };

        retry_async_with_config(RetryConfig::default(), || async {
            let cursor = self.attempts().find(filter.clone()).await?;
            cursor.try_collect().await
        })
        .await
        .map_err(backend)
    }

    async fn completed_for_student(&self, student_id: &str) -> Result<Vec<Attempt>, StoreError> {
        let filter = doc! {
            "student_id": student_id,
            "status": AttemptStatus::Completed.as_str(),
        };

        retry_async_with_config(RetryConfig::default(), || async {
            let cursor = self.attempts().find(filter.clone()).await?;
            cursor.try_collect().await
        })
        .await
        .map_err(backend)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        ExamCatalog::ping(self).await
    }
}
