use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    attempt::AttemptAnswer,
    QuestionSnapshot, QuestionType,
};

/// Grading result for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub is_correct: Option<bool>,
    pub points_awarded: i64,
}

impl GradeOutcome {
    fn correct(points: i64) -> Self {
        Self {
            is_correct: Some(true),
            points_awarded: points,
        }
    }

    fn incorrect() -> Self {
        Self {
            is_correct: Some(false),
            points_awarded: 0,
        }
    }

    fn pending() -> Self {
        Self {
            is_correct: None,
            points_awarded: 0,
        }
    }
}

/// Deterministic per-type grading rule: a pure function of the
/// question's correct-answer set and the submitted selection.
///
/// multiple_answers is exact set equality, with no partial credit. A
/// partial-credit scheme would be a policy change made here, not a
/// tweak at call sites.
pub fn grade_answer(snapshot: &QuestionSnapshot, answer: &AttemptAnswer) -> GradeOutcome {
    let points = snapshot.question.points;

    match snapshot.question.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            let matched = snapshot.correct_option_ids.len() == 1
                && answer.selected_option_ids.len() == 1
                && answer.selected_option_ids[0] == snapshot.correct_option_ids[0];
            if matched {
                GradeOutcome::correct(points)
            } else {
                GradeOutcome::incorrect()
            }
        }
        QuestionType::MultipleAnswers => {
            let expected: BTreeSet<&str> = snapshot
                .correct_option_ids
                .iter()
                .map(String::as_str)
                .collect();
            let submitted: BTreeSet<&str> = answer
                .selected_option_ids
                .iter()
                .map(String::as_str)
                .collect();
            if !expected.is_empty() && submitted == expected {
                GradeOutcome::correct(points)
            } else {
                GradeOutcome::incorrect()
            }
        }
        QuestionType::ShortAnswer | QuestionType::Essay => GradeOutcome::pending(),
    }
}

/// Grades every recorded answer of an attempt in place. Runs from
/// scratch each time, so re-running after a failed completion is safe.
pub fn grade_all(
    snapshots: &[QuestionSnapshot],
    answers: &mut BTreeMap<String, AttemptAnswer>,
) {
    for snapshot in snapshots {
        if let Some(answer) = answers.get_mut(&snapshot.question.id) {
            let outcome = grade_answer(snapshot, answer);
            answer.is_correct = outcome.is_correct;
            answer.points_awarded = outcome.points_awarded;
        }
    }
}

/// Policy deciding whether a manually-awarded score counts as
/// "correct". The default (half the maximum or more) mirrors the
/// existing product convention; it is a default, not a domain law,
/// and callers may construct a different fraction.
#[derive(Debug, Clone, Copy)]
pub struct ManualGradePolicy {
    pub pass_fraction: f64,
}

impl Default for ManualGradePolicy {
    fn default() -> Self {
        Self { pass_fraction: 0.5 }
    }
}

impl ManualGradePolicy {
    pub fn new(pass_fraction: f64) -> Self {
        Self { pass_fraction }
    }

    pub fn is_correct(&self, points: i64, max_points: i64) -> bool {
        points as f64 >= max_points.max(0) as f64 * self.pass_fraction
    }

    /// Clamps a grader-supplied score into [0, max_points].
    pub fn clamp(points: i64, max_points: i64) -> i64 {
        points.clamp(0, max_points.max(0))
    }
}
