use async_trait::async_trait;

use crate::models::{
    attempt::{Attempt, AttemptAnswer},
    Exam, QuestionSnapshot,
};

pub mod memory;
pub mod mongo;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

/// Outcome of the atomic start insert.
#[derive(Debug)]
pub enum StartOutcome {
    Created(Attempt),
    /// An in_progress attempt already existed for (exam, student);
    /// the caller resumes it instead of creating a second one.
    Existing(Attempt),
}

/// Read-only access to the authored catalog: exams, questions, options
/// and correct answers, plus the class-membership lookup eligibility
/// needs. Owned by the authoring subsystem; this engine only reads.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    async fn find_exam(&self, exam_id: &str) -> Result<Option<Exam>, StoreError>;

    /// Fully-materialized question snapshots for an exam, in question
    /// order. Bank questions (no exam assignment) never appear.
    async fn exam_questions(&self, exam_id: &str) -> Result<Vec<QuestionSnapshot>, StoreError>;

    async fn student_in_class(&self, class_id: &str, student_id: &str)
        -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// The only writer of attempt state. Everything that must be atomic
/// lives behind one call here: the uniqueness-arbitrated start insert,
/// the single-slot answer upsert, and the status-guarded finalize.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn find_in_progress(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<Option<Attempt>, StoreError>;

    /// Inserts a fresh in_progress attempt unless one already exists
    /// for (exam, student). The store arbitrates the race; callers
    /// never check-then-create.
    async fn insert_in_progress(&self, attempt: Attempt) -> Result<StartOutcome, StoreError>;

    async fn find_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>, StoreError>;

    async fn find_attempt_by_answer(&self, answer_id: &str)
        -> Result<Option<Attempt>, StoreError>;

    /// Single-slot upsert keyed by (attempt, question): a second
    /// submission for the same question replaces the first.
    async fn upsert_answer(
        &self,
        attempt_id: &str,
        answer: &AttemptAnswer,
    ) -> Result<(), StoreError>;

    /// Replaces the attempt iff it is still in_progress, in one write.
    /// Returns false when another writer already moved it to a
    /// terminal state.
    async fn finalize_if_in_progress(&self, attempt: &Attempt) -> Result<bool, StoreError>;

    /// Writes back a manually re-graded attempt (already terminal).
    async fn update_graded(&self, attempt: &Attempt) -> Result<(), StoreError>;

    async fn count_completed(&self, exam_id: &str, student_id: &str) -> Result<u64, StoreError>;

    async fn completed_for_exam(&self, exam_id: &str) -> Result<Vec<Attempt>, StoreError>;

    async fn completed_for_student(&self, student_id: &str) -> Result<Vec<Attempt>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Answer ids are `<attempt_id>:<question_id>`; the prefix routes a
/// manual-grading request to its owning attempt.
pub(crate) fn attempt_id_of_answer(answer_id: &str) -> Option<&str> {
    answer_id.split_once(':').map(|(attempt_id, _)| attempt_id)
}
