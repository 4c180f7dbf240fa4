//! Quiz scoring
//!
//! Exact-match scoring: a choice question earns its points only when the
//! submitted set equals the correct set. Open questions are never auto-graded.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

use super::scale::Percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
    Open,
}

impl QuestionKind {
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Single | Self::Multiple)
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            "open" => Ok(Self::Open),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// Answer key for one question.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_id: Uuid,
    pub kind: QuestionKind,
    pub points: u32,
    pub correct: BTreeSet<Uuid>,
}

/// One submitted answer.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizAnswer {
    pub question: Uuid,
    #[serde(default)]
    pub choices: Vec<Uuid>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuizScore {
    pub points_earned: u32,
    pub points_total: u32,
    pub grade_percent: Percent,
}

/// Score `answers` against `keys`.
///
/// The total counts every question in the key, answered or not. Answers to
/// unknown questions are ignored, and only the first answer per question counts.
pub fn score_quiz(keys: &[AnswerKey], answers: &[QuizAnswer]) -> QuizScore {
    let by_id: HashMap<Uuid, &AnswerKey> = keys.iter().map(|k| (k.question_id, k)).collect();
    let points_total: u32 = keys.iter().map(|k| k.points).sum();

    let mut seen = HashSet::new();
    let mut points_earned = 0;

    for answer in answers {
        let Some(key) = by_id.get(&answer.question) else {
            continue;
        };
        if !seen.insert(answer.question) {
            continue;
        }
        if !key.kind.is_choice() || key.correct.is_empty() {
            continue;
        }

        let sent: BTreeSet<Uuid> = answer.choices.iter().copied().collect();
        if sent == key.correct {
            points_earned += key.points;
        }
    }

    QuizScore {
        points_earned,
        points_total,
        grade_percent: Percent::ratio(f64::from(points_earned), f64::from(points_total)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: QuestionKind, points: u32, correct: &[Uuid]) -> AnswerKey {
        AnswerKey {
            question_id: Uuid::new_v4(),
            kind,
            points,
            correct: correct.iter().copied().collect(),
        }
    }

    fn answer(question: Uuid, choices: &[Uuid]) -> QuizAnswer {
        QuizAnswer { question, choices: choices.to_vec(), text: None }
    }

    #[test]
    fn test_exact_match_scoring() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let q1 = key(QuestionKind::Multiple, 1, &[a, b]);
        let q2 = key(QuestionKind::Single, 1, &[c]);

        let score = score_quiz(
            &[q1.clone(), q2.clone()],
            &[answer(q1.question_id, &[b, a]), answer(q2.question_id, &[d])],
        );

        assert_eq!(score.points_earned, 1);
        assert_eq!(score.points_total, 2);
        assert_eq!(score.grade_percent.value(), 50.0);
    }

    #[test]
    fn test_no_partial_credit() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let q = key(QuestionKind::Multiple, 3, &[a, b]);

        assert_eq!(score_quiz(&[q.clone()], &[answer(q.question_id, &[a])]).points_earned, 0);
        assert_eq!(score_quiz(&[q.clone()], &[answer(q.question_id, &[a, b, Uuid::new_v4()])]).points_earned, 0);
    }

    #[test]
    fn test_open_questions_score_zero() {
        let q = key(QuestionKind::Open, 5, &[]);
        let score = score_quiz(
            &[q.clone()],
            &[QuizAnswer { question: q.question_id, choices: vec![], text: Some("essay".into()) }],
        );
        assert_eq!(score.points_earned, 0);
        assert_eq!(score.points_total, 5);
        assert_eq!(score.grade_percent, Percent::ZERO);
    }

    #[test]
    fn test_question_without_correct_choice_never_scores() {
        let q = key(QuestionKind::Single, 2, &[]);
        assert_eq!(score_quiz(&[q.clone()], &[answer(q.question_id, &[])]).points_earned, 0);
    }

    #[test]
    fn test_unknown_and_duplicate_answers() {
        let a = Uuid::new_v4();
        let q = key(QuestionKind::Single, 2, &[a]);

        let score = score_quiz(
            &[q.clone()],
            &[
                answer(Uuid::new_v4(), &[a]),
                answer(q.question_id, &[a]),
                answer(q.question_id, &[a]),
            ],
        );
        assert_eq!(score.points_earned, 2);
        assert_eq!(score.grade_percent.value(), 100.0);
    }

    #[test]
    fn test_unanswered_questions_count_in_total() {
        let a = Uuid::new_v4();
        let q1 = key(QuestionKind::Single, 1, &[a]);
        let q2 = key(QuestionKind::Single, 2, &[Uuid::new_v4()]);

        let score = score_quiz(&[q1.clone(), q2], &[answer(q1.question_id, &[a])]);
        assert_eq!(score.points_total, 3);
        assert_eq!(score.grade_percent.value(), 33.33);
    }

    #[test]
    fn test_empty_key() {
        let score = score_quiz(&[], &[]);
        assert_eq!(score.points_total, 0);
        assert_eq!(score.grade_percent, Percent::ZERO);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("multiple".parse::<QuestionKind>(), Ok(QuestionKind::Multiple));
        assert!("essay".parse::<QuestionKind>().is_err());
    }
}
