//! Quiz template model (evaluation, questions, choices)

use sqlx::{FromRow, PgConnection};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::grading::{AnswerKey, QuestionKind};

#[derive(Debug, Clone, FromRow)]
struct KeyRow {
    question_id: Uuid,
    kind: String,
    points: i32,
    correct_choice: Option<Uuid>,
}

pub struct Evaluation;

impl Evaluation {
    /// Answer keys for the quiz attached to an activity.
    ///
    /// `None` when the activity has no evaluation. Questions with an
    /// unrecognised type are scored as open questions, and a question
    /// without positive points is worth 1.
    pub async fn answer_keys(
        conn: &mut PgConnection,
        activity_id: Uuid,
    ) -> Result<Option<Vec<AnswerKey>>, sqlx::Error> {
        let evaluation_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM evaluations WHERE activity_id = $1"
        )
        .bind(activity_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(evaluation_id) = evaluation_id else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, KeyRow>(
            r#"
            SELECT q.id AS question_id, q.kind, q.points, c.id AS correct_choice
            FROM questions q
            LEFT JOIN choices c ON c.question_id = q.id AND c.is_correct
            WHERE q.evaluation_id = $1
            ORDER BY q.id
            "#
        )
        .bind(evaluation_id)
        .fetch_all(conn)
        .await?;

        Ok(Some(fold_keys(rows)))
    }
}

fn fold_keys(rows: Vec<KeyRow>) -> Vec<AnswerKey> {
    let mut keys: BTreeMap<Uuid, AnswerKey> = BTreeMap::new();

    for row in rows {
        let key = keys.entry(row.question_id).or_insert_with(|| AnswerKey {
            question_id: row.question_id,
            kind: row.kind.parse().unwrap_or_else(|e| {
                tracing::warn!("Question {}: {}", row.question_id, e);
                QuestionKind::Open
            }),
            points: question_points(row.points),
            correct: Default::default(),
        });

        if let Some(choice) = row.correct_choice {
            key.correct.insert(choice);
        }
    }

    keys.into_values().collect()
}

fn question_points(points: i32) -> u32 {
    match u32::try_from(points) {
        Ok(0) | Err(_) => 1,
        Ok(points) => points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_keys_groups_correct_choices() {
        let q1 = Uuid::new_v4();
        let q2 = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let rows = vec![
            KeyRow { question_id: q1, kind: "multiple".into(), points: 2, correct_choice: Some(a) },
            KeyRow { question_id: q1, kind: "multiple".into(), points: 2, correct_choice: Some(b) },
            KeyRow { question_id: q2, kind: "open".into(), points: 1, correct_choice: None },
        ];

        let keys = fold_keys(rows);
        assert_eq!(keys.len(), 2);

        let k1 = keys.iter().find(|k| k.question_id == q1).unwrap();
        assert_eq!(k1.kind, QuestionKind::Multiple);
        assert_eq!(k1.points, 2);
        assert_eq!(k1.correct.len(), 2);

        let k2 = keys.iter().find(|k| k.question_id == q2).unwrap();
        assert_eq!(k2.kind, QuestionKind::Open);
        assert!(k2.correct.is_empty());
    }

    #[test]
    fn test_fold_keys_unknown_kind_is_open() {
        let rows = vec![KeyRow { question_id: Uuid::new_v4(), kind: "essay".into(), points: -3, correct_choice: None }];
        let keys = fold_keys(rows);
        assert_eq!(keys[0].kind, QuestionKind::Open);
        assert_eq!(keys[0].points, 1);
    }

    #[test]
    fn test_zero_point_question_counts_as_one() {
        let q = Uuid::new_v4();
        let a = Uuid::new_v4();
        let rows = vec![KeyRow { question_id: q, kind: "single".into(), points: 0, correct_choice: Some(a) }];

        let keys = fold_keys(rows);
        assert_eq!(keys[0].points, 1);

        let score = crate::grading::score_quiz(
            &keys,
            &[crate::grading::QuizAnswer { question: q, choices: vec![a], text: None }],
        );
        assert_eq!(score.points_total, 1);
        assert_eq!(score.grade_percent.value(), 100.0);
    }
}
