//! Attempt and monitoring lifecycles
//!
//! Every function here expects to run inside a transaction owned by the
//! caller and leaves the attempt's final grade consistent with its inputs.

pub mod attempt;
pub mod monitoring;
pub mod recompute;

use crate::grading::WeightConfig;
use crate::models::StoredWeights;
use crate::{AppResult, AppState};

/// Weights for this request, served from the process cache
pub async fn current_weights(state: &AppState) -> AppResult<WeightConfig> {
    let weights = state
        .weights
        .get_or_load(|| StoredWeights::load(&state.pool))
        .await?;
    Ok(weights)
}

/// Database fixtures for lifecycle tests. Tests return early when
/// `DATABASE_URL` is not set.
#[cfg(test)]
pub(crate) mod fixtures {
    use sqlx::{postgres::PgPoolOptions, PgPool};
    use tokio::sync::OnceCell;
    use uuid::Uuid;

    use crate::models::RecordSampleRequest;

    static SCHEMA: OnceCell<()> = OnceCell::const_new();

    pub async fn pool() -> Option<PgPool> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping database test");
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");

        SCHEMA
            .get_or_init(|| async {
                crate::db::run_migrations(&pool).await.expect("apply schema");
            })
            .await;

        Some(pool)
    }

    pub struct Course {
        pub owner: Uuid,
        pub activity: Uuid,
    }

    pub async fn course(pool: &PgPool, points: i32, requires_monitoring: bool, exam_mode: &str) -> Course {
        let owner = Uuid::new_v4();
        let course: Uuid = sqlx::query_scalar(
            "INSERT INTO courses (owner_id, name, code) VALUES ($1, 'Algebra', 'ALG-1') RETURNING id"
        )
        .bind(owner)
        .fetch_one(pool)
        .await
        .unwrap();

        let module: Uuid = sqlx::query_scalar(
            "INSERT INTO modules (course_id, title) VALUES ($1, 'Unit 1') RETURNING id"
        )
        .bind(course)
        .fetch_one(pool)
        .await
        .unwrap();

        let activity: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO activities (module_id, title, points, requires_monitoring, exam_mode)
            VALUES ($1, 'Midterm', $2, $3, $4)
            RETURNING id
            "#
        )
        .bind(module)
        .bind(points)
        .bind(requires_monitoring)
        .bind(exam_mode)
        .fetch_one(pool)
        .await
        .unwrap();

        Course { owner, activity }
    }

    pub fn sample(score: i32) -> RecordSampleRequest {
        RecordSampleRequest {
            score,
            absent: false,
            reason: None,
            ear: None,
            mar: None,
            yaw: None,
        }
    }

    pub async fn open_session_count(pool: &PgPool, student: Uuid) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM monitoring_sessions WHERE student_id = $1 AND ended_at IS NULL"
        )
        .bind(student)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}
