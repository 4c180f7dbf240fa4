//! Activity attempt model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::grading::QuizAnswer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Open,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityAttempt {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub student_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub monitoring_id: Option<Uuid>,
    /// 0..100
    pub monitoring_score: f64,
    /// 0..100
    pub evaluation_grade: Option<f64>,
    pub submission_id: Option<Uuid>,
    /// 0..100, written only by the compositor
    pub final_grade: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub activity_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub monitoring_session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct FinishAttemptResponse {
    pub attempt_id: Uuid,
    pub state: AttemptState,
    pub monitoring_score: f64,
    pub monitoring_fraction: f64,
    pub evaluation_grade: f64,
    pub final_grade: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub attempt_id: Option<Uuid>,
    #[serde(default)]
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub attempt_id: Uuid,
    pub points_earned: u32,
    pub points_total: u32,
    pub grade_percent: f64,
    pub final_grade: Option<f64>,
}

/// Compact attempt summary used in responses that touch an attempt indirectly
#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub monitoring_score: f64,
    pub evaluation_grade: f64,
    pub final_grade: f64,
}

// Lock order: a monitoring session row is always locked before the attempt
// linked to it. Lookups below are plain reads; `lock` and
// `find_by_monitoring` take the row lock.
impl ActivityAttempt {
    pub fn state(&self) -> AttemptState {
        match self.ended_at {
            None => AttemptState::Open,
            Some(_) => AttemptState::Finished,
        }
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            id: self.id,
            activity_id: self.activity_id,
            monitoring_score: self.monitoring_score,
            evaluation_grade: self.evaluation_grade.unwrap_or(0.0),
            final_grade: self.final_grade.unwrap_or(0.0),
        }
    }

    /// Insert an open attempt unless the pair already has one.
    pub async fn insert_open(
        conn: &mut PgConnection,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            INSERT INTO activity_attempts (activity_id, student_id)
            VALUES ($1, $2)
            ON CONFLICT (activity_id, student_id) WHERE ended_at IS NULL DO NOTHING
            RETURNING *
            "#
        )
        .bind(activity_id)
        .bind(student_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_open(
        conn: &mut PgConnection,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            SELECT * FROM activity_attempts
            WHERE activity_id = $1 AND student_id = $2 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#
        )
        .bind(activity_id)
        .bind(student_id)
        .fetch_optional(conn)
        .await
    }

    /// Newest attempt of the pair, open or finished
    pub async fn latest(
        conn: &mut PgConnection,
        activity_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            SELECT * FROM activity_attempts
            WHERE activity_id = $1 AND student_id = $2
            ORDER BY started_at DESC
            LIMIT 1
            "#
        )
        .bind(activity_id)
        .bind(student_id)
        .fetch_optional(conn)
        .await
    }

    /// Attempt owned by `student_id`, optionally restricted to one activity
    pub async fn find_owned(
        conn: &mut PgConnection,
        id: Uuid,
        student_id: Uuid,
        activity_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            SELECT * FROM activity_attempts
            WHERE id = $1 AND student_id = $2 AND ($3::uuid IS NULL OR activity_id = $3)
            "#
        )
        .bind(id)
        .bind(student_id)
        .bind(activity_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>("SELECT * FROM activity_attempts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn latest_open_unmonitored(
        conn: &mut PgConnection,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            SELECT * FROM activity_attempts
            WHERE student_id = $1 AND ended_at IS NULL AND monitoring_id IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#
        )
        .bind(student_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_by_monitoring(
        conn: &mut PgConnection,
        session_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            SELECT * FROM activity_attempts
            WHERE monitoring_id = $1
            ORDER BY started_at DESC
            LIMIT 1
            FOR UPDATE
            "#
        )
        .bind(session_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn link_monitoring(
        conn: &mut PgConnection,
        id: Uuid,
        session_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            "UPDATE activity_attempts SET monitoring_id = $2 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(session_id)
        .fetch_one(conn)
        .await
    }

    pub async fn set_monitoring_score(
        conn: &mut PgConnection,
        id: Uuid,
        score: f64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            "UPDATE activity_attempts SET monitoring_score = $2 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(score)
        .fetch_one(conn)
        .await
    }

    /// Finish if still open. `None` means it was already finished.
    pub async fn mark_finished(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            UPDATE activity_attempts
            SET ended_at = NOW()
            WHERE id = $1 AND ended_at IS NULL
            RETURNING *
            "#
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_evaluation(
        conn: &mut PgConnection,
        id: Uuid,
        grade: f64,
        submission_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            UPDATE activity_attempts
            SET evaluation_grade = $2, submission_id = COALESCE($3, submission_id)
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(grade)
        .bind(submission_id)
        .fetch_one(conn)
        .await
    }

    pub async fn store_grades(
        conn: &mut PgConnection,
        id: Uuid,
        evaluation_grade: Option<f64>,
        final_grade: f64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            r#"
            UPDATE activity_attempts
            SET evaluation_grade = $2, final_grade = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(evaluation_grade)
        .bind(final_grade)
        .fetch_one(conn)
        .await
    }

    pub async fn list_by_student(pool: &PgPool, student_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityAttempt>(
            "SELECT * FROM activity_attempts WHERE student_id = $1 ORDER BY started_at DESC"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }
}
