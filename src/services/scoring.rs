use std::collections::HashMap;

use crate::db::models::Question;
use crate::db::types::QuestionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScoreBreakdown {
    pub(crate) correct: i32,
    pub(crate) wrong: i32,
    pub(crate) unanswered: i32,
    pub(crate) percentage: i32,
}

/// Scores an answer map against the fixed question list. Pure: identical
/// inputs always produce an identical breakdown.
pub(crate) fn score(answers: &HashMap<String, String>, questions: &[Question]) -> ScoreBreakdown {
    let mut correct = 0;
    let mut wrong = 0;
    let mut unanswered = 0;

    for question in questions {
        match answers.get(&question.id) {
            None => unanswered += 1,
            Some(submitted) => {
                if answer_matches(question.kind, submitted, &question.correct_answer) {
                    correct += 1;
                } else {
                    wrong += 1;
                }
            }
        }
    }

    let total = questions.len() as i32;
    let percentage =
        if total == 0 { 0 } else { ((correct as f64) * 100.0 / (total as f64)).round() as i32 };

    ScoreBreakdown { correct, wrong, unanswered, percentage }
}

/// Choice kinds compare trimmed and case-sensitive; fill-blank compares
/// trimmed and case-insensitive, since trainees cannot know the
/// capitalization the exam author typed.
pub(crate) fn answer_matches(kind: QuestionKind, submitted: &str, correct: &str) -> bool {
    let submitted = submitted.trim();
    let correct = correct.trim();

    match kind {
        QuestionKind::MultipleChoice | QuestionKind::TrueFalse => submitted == correct,
        QuestionKind::FillBlank => submitted.eq_ignore_ascii_case(correct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::question_with_answer;

    fn answered(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(id, answer)| (id.to_string(), answer.to_string())).collect()
    }

    #[test]
    fn three_of_five_is_sixty_percent() {
        let questions: Vec<_> = (1..=5)
            .map(|n| {
                question_with_answer(&format!("q{n}"), QuestionKind::MultipleChoice, "A")
            })
            .collect();
        let answers =
            answered(&[("q1", "A"), ("q2", "A"), ("q3", "A"), ("q4", "B"), ("q5", "C")]);

        let breakdown = score(&answers, &questions);

        assert_eq!(
            breakdown,
            ScoreBreakdown { correct: 3, wrong: 2, unanswered: 0, percentage: 60 }
        );
    }

    #[test]
    fn unanswered_questions_are_counted_separately() {
        let questions = vec![
            question_with_answer("q1", QuestionKind::TrueFalse, "true"),
            question_with_answer("q2", QuestionKind::TrueFalse, "false"),
            question_with_answer("q3", QuestionKind::TrueFalse, "true"),
        ];
        let answers = answered(&[("q1", "true")]);

        let breakdown = score(&answers, &questions);

        assert_eq!(
            breakdown,
            ScoreBreakdown { correct: 1, wrong: 0, unanswered: 2, percentage: 33 }
        );
    }

    #[test]
    fn empty_answer_map_scores_zero() {
        let questions = vec![question_with_answer("q1", QuestionKind::MultipleChoice, "B")];
        let breakdown = score(&HashMap::new(), &questions);

        assert_eq!(
            breakdown,
            ScoreBreakdown { correct: 0, wrong: 0, unanswered: 1, percentage: 0 }
        );
    }

    #[test]
    fn score_is_deterministic() {
        let questions = vec![
            question_with_answer("q1", QuestionKind::MultipleChoice, "A"),
            question_with_answer("q2", QuestionKind::FillBlank, "Photosynthesis"),
        ];
        let answers = answered(&[("q1", "A"), ("q2", "photosynthesis")]);

        let first = score(&answers, &questions);
        let second = score(&answers, &questions);

        assert_eq!(first, second);
        assert_eq!(first.correct, 2);
    }

    #[test]
    fn choice_answers_are_case_sensitive_after_trim() {
        assert!(answer_matches(QuestionKind::MultipleChoice, "  A ", "A"));
        assert!(!answer_matches(QuestionKind::MultipleChoice, "a", "A"));
        assert!(answer_matches(QuestionKind::TrueFalse, "true ", "true"));
        assert!(!answer_matches(QuestionKind::TrueFalse, "True", "true"));
    }

    #[test]
    fn fill_blank_ignores_case_and_surrounding_whitespace() {
        assert!(answer_matches(QuestionKind::FillBlank, " mitochondria ", "Mitochondria"));
        assert!(!answer_matches(QuestionKind::FillBlank, "mitochondrion", "Mitochondria"));
    }
}
