use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{Exam, ExamStatus};

/// Why a student may not start an exam. Recoverable and user-facing;
/// producing one never mutates state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    NotAvailable,
    MaxAttemptsReached,
    NotEnrolled,
}

impl IneligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IneligibleReason::NotAvailable => "not available",
            IneligibleReason::MaxAttemptsReached => "max attempts reached",
            IneligibleReason::NotEnrolled => "not enrolled",
        }
    }
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate for starting an exam, checked in order: the exam must be
/// published and inside its scheduling window, the student must have
/// completed attempts left, and for class-bound exams must be
/// enrolled. `enrolled` is the externally-resolved membership answer;
/// callers pass true for exams without a class.
pub fn can_start(
    exam: &Exam,
    completed_attempts: u64,
    enrolled: bool,
    now: DateTime<Utc>,
) -> Result<(), IneligibleReason> {
    if exam.status != ExamStatus::Published || now < exam.start_date || now > exam.end_date {
        return Err(IneligibleReason::NotAvailable);
    }

    if completed_attempts >= u64::from(exam.max_attempts) {
        return Err(IneligibleReason::MaxAttemptsReached);
    }

    if exam.class_id.is_some() && !enrolled {
        return Err(IneligibleReason::NotEnrolled);
    }

    Ok(())
}
