use std::collections::BTreeMap;

use crate::models::{attempt::AttemptAnswer, QuestionSnapshot};

/// Aggregated score for one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub score: i64,
    pub percentage: f64,
}

pub fn total_points(snapshots: &[QuestionSnapshot]) -> i64 {
    snapshots.iter().map(|s| s.question.points).sum()
}

/// The exam row carries a denormalized total maintained by the
/// authoring side; question edits can leave it stale. The sum derived
/// from the question snapshots wins on mismatch.
pub fn effective_total_points(exam_id: &str, exam_total: i64, snapshots: &[QuestionSnapshot]) -> i64 {
    let derived = total_points(snapshots);
    if derived != exam_total {
        tracing::warn!(
            "Exam {} carries stale total_points {} (questions sum to {}); using the derived sum",
            exam_id,
            exam_total,
            derived
        );
    }
    derived
}

/// Recomputes score and percentage from scratch over every recorded
/// answer. Never incremental: manual grading can revise any
/// points_awarded after the fact.
pub fn calculate(answers: &BTreeMap<String, AttemptAnswer>, total_points: i64) -> ScoreSummary {
    let score: i64 = answers.values().map(|a| a.points_awarded).sum();
    let percentage = if total_points > 0 {
        100.0 * score as f64 / total_points as f64
    } else {
        0.0
    };

    ScoreSummary { score, percentage }
}

pub fn has_passed(percentage: f64, passing_score: f64) -> bool {
    percentage >= passing_score
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::models::attempt::AttemptAnswer;

    use super::*;

    fn answer(question_id: &str, points_awarded: i64) -> AttemptAnswer {
        AttemptAnswer {
            id: format!("att:{}", question_id),
            question_id: question_id.into(),
            selected_option_ids: vec![],
            answer_text: None,
            is_correct: Some(points_awarded > 0),
            points_awarded,
            time_spent_seconds: 0,
            feedback: None,
            submitted_at: Utc::now(),
        }
    }

    fn answers(rows: &[(&str, i64)]) -> BTreeMap<String, AttemptAnswer> {
        rows.iter()
            .map(|(q, p)| (q.to_string(), answer(q, *p)))
            .collect()
    }

    #[test]
    fn score_is_the_sum_of_awarded_points() {
        let summary = calculate(&answers(&[("q1", 5), ("q2", 0), ("q3", 3)]), 20);
        assert_eq!(summary.score, 8);
        assert!((summary.percentage - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_points_means_zero_percentage() {
        let summary = calculate(&answers(&[("q1", 0)]), 0);
        assert_eq!(summary.score, 0);
        assert_eq!(summary.percentage, 0.0);
    }

    #[test]
    fn empty_attempt_scores_zero() {
        let summary = calculate(&BTreeMap::new(), 10);
        assert_eq!(summary.score, 0);
        assert_eq!(summary.percentage, 0.0);
    }

    #[test]
    fn passing_is_inclusive_of_the_threshold() {
        assert!(has_passed(60.0, 60.0));
        assert!(has_passed(60.1, 60.0));
        assert!(!has_passed(59.9, 60.0));
    }
}
