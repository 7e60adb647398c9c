use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::models::{Attempt, Exam, Question, User};
use crate::repositories;

#[derive(Debug, Error)]
pub(crate) enum LoadError {
    #[error("no active exam is currently available")]
    NoActiveExam,
    #[error("no questions configured for the active exam's subjects")]
    NoQuestionsForSubjects,
    #[error("question bank has {available} questions but the exam requests {requested}")]
    BankTooSmall { available: usize, requested: usize },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub(crate) enum LoadOutcome {
    /// The trainee may start: the fixed question list for the attempt plus
    /// the seed that produced it (when randomization is on).
    Available { exam: Exam, questions: Vec<Question>, selection_seed: Option<i64> },
    /// Retake prevention: a record already exists, shown read-only.
    AlreadyTaken { exam: Exam, record: Attempt },
}

/// Resolves what the trainee sees when opening the CBT screen: the active
/// exam with this attempt's question selection, their prior result, or a
/// blocking configuration error.
pub(crate) async fn load(pool: &PgPool, trainee: &User) -> Result<LoadOutcome, LoadError> {
    let Some(exam) = repositories::exams::find_active(pool).await? else {
        return Err(LoadError::NoActiveExam);
    };

    if let Some(record) =
        repositories::attempts::find_by_exam_and_trainee(pool, &exam.id, &trainee.id).await?
    {
        return Ok(LoadOutcome::AlreadyTaken { exam, record });
    }

    let bank = repositories::questions::list_by_subjects(pool, &exam.subjects.0).await?;
    if bank.is_empty() {
        return Err(LoadError::NoQuestionsForSubjects);
    }

    let requested = exam.total_questions.max(0) as usize;
    let (questions, selection_seed) = if exam.randomize_questions {
        let seed = rand::random::<u64>();
        (select_random(bank, requested, seed)?, Some(seed as i64))
    } else {
        (select_in_bank_order(bank, requested)?, None)
    };

    Ok(LoadOutcome::Available { exam, questions, selection_seed })
}

/// Uniform sample without replacement, fixed by the seed for the lifetime of
/// the attempt. Fails loudly when the bank cannot cover the request.
pub(crate) fn select_random(
    mut bank: Vec<Question>,
    requested: usize,
    seed: u64,
) -> Result<Vec<Question>, LoadError> {
    if bank.len() < requested {
        return Err(LoadError::BankTooSmall { available: bank.len(), requested });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    bank.shuffle(&mut rng);
    bank.truncate(requested);
    Ok(bank)
}

pub(crate) fn select_in_bank_order(
    mut bank: Vec<Question>,
    requested: usize,
) -> Result<Vec<Question>, LoadError> {
    if bank.len() < requested {
        return Err(LoadError::BankTooSmall { available: bank.len(), requested });
    }

    bank.truncate(requested);
    Ok(bank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QuestionKind;
    use crate::test_support::fixtures::question_with_answer;

    fn bank(count: usize) -> Vec<Question> {
        (1..=count)
            .map(|n| question_with_answer(&format!("q{n}"), QuestionKind::MultipleChoice, "A"))
            .collect()
    }

    #[test]
    fn bank_order_selection_takes_first_n() {
        let selected = select_in_bank_order(bank(10), 4).expect("selection");
        let ids: Vec<_> = selected.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, ["q1", "q2", "q3", "q4"]);
    }

    #[test]
    fn random_selection_is_fixed_by_seed() {
        let first = select_random(bank(20), 5, 42).expect("selection");
        let second = select_random(bank(20), 5, 42).expect("selection");

        let first_ids: Vec<_> = first.iter().map(|q| q.id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|q| q.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(first_ids.len(), 5);
    }

    #[test]
    fn random_selection_has_no_duplicates() {
        let selected = select_random(bank(8), 8, 7).expect("selection");
        let mut ids: Vec<_> = selected.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn undersized_bank_fails_loudly() {
        let result = select_random(bank(3), 5, 1);
        assert!(matches!(result, Err(LoadError::BankTooSmall { available: 3, requested: 5 })));

        let result = select_in_bank_order(bank(3), 5);
        assert!(matches!(result, Err(LoadError::BankTooSmall { available: 3, requested: 5 })));
    }
}
