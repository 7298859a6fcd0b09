use chrono::{DateTime, Utc};

use crate::model::ids::{ExamSetId, QuestionId, UserId};

/// A user's running record for one question of an exam set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionProgress {
    pub user_id: UserId,
    pub exam_set_id: ExamSetId,
    pub question_id: QuestionId,
    pub last_result: bool,
    pub attempt_count: u32,
    pub last_attempted: DateTime<Utc>,
}

impl QuestionProgress {
    /// Progress after a first attempt.
    #[must_use]
    pub fn first_attempt(
        user_id: UserId,
        exam_set_id: ExamSetId,
        question_id: QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            exam_set_id,
            question_id,
            last_result: is_correct,
            attempt_count: 1,
            last_attempted: at,
        }
    }

    /// Fold another attempt into this record.
    pub fn record_attempt(&mut self, is_correct: bool, at: DateTime<Utc>) {
        self.last_result = is_correct;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempted = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn attempts_accumulate_and_keep_latest_result() {
        let mut p = QuestionProgress::first_attempt(
            UserId::new("u"),
            ExamSetId::new(1),
            QuestionId::new("q"),
            false,
            fixed_now(),
        );
        let later = fixed_now() + chrono::Duration::minutes(5);
        p.record_attempt(true, later);
        assert_eq!(p.attempt_count, 2);
        assert!(p.last_result);
        assert_eq!(p.last_attempted, later);
    }
}
