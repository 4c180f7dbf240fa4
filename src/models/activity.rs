//! Activity and submission models
//!
//! Both tables belong to course management; this service reads activities
//! and only ever writes `submissions.grade`.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamMode {
    Quiz,
    File,
}

impl ExamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub points: i32,
    pub requires_monitoring: bool,
    pub exam_mode: String,
}

impl Activity {
    /// Unknown or blank modes are treated as quizzes
    pub fn exam_mode(&self) -> ExamMode {
        match self.exam_mode.as_str() {
            "file" => ExamMode::File,
            _ => ExamMode::Quiz,
        }
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, module_id, title, points, requires_monitoring, exam_mode
            FROM activities
            WHERE id = $1
            "#
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Professor owning the course this activity belongs to
    pub async fn course_owner(conn: &mut PgConnection, activity_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT c.owner_id FROM activities a
            JOIN modules m ON a.module_id = m.id
            JOIN courses c ON m.course_id = c.id
            WHERE a.id = $1
            "#
        )
        .bind(activity_id)
        .fetch_optional(conn)
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub student_id: Uuid,
    pub file_url: String,
    pub grade: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn set_grade(conn: &mut PgConnection, id: Uuid, grade: f64) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Submission>(
            "UPDATE submissions SET grade = $2 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(grade)
        .fetch_one(conn)
        .await
    }

    /// Newest graded submission of a student for an activity
    pub async fn latest_graded(
        conn: &mut PgConnection,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Submission>(
            r#"
            SELECT * FROM submissions
            WHERE activity_id = $1 AND student_id = $2 AND grade IS NOT NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#
        )
        .bind(activity_id)
        .bind(student_id)
        .fetch_optional(conn)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(mode: &str) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            module_id: Uuid::new_v4(),
            title: "Evaluation 1".to_string(),
            points: 20,
            requires_monitoring: true,
            exam_mode: mode.to_string(),
        }
    }

    #[test]
    fn test_exam_mode() {
        assert_eq!(activity("file").exam_mode(), ExamMode::File);
        assert_eq!(activity("quiz").exam_mode(), ExamMode::Quiz);
        assert_eq!(activity("").exam_mode(), ExamMode::Quiz);
    }
}
