//! Monitoring session and attention sample models

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::grading::{AttentionAggregator, OverrideFields, Percent, ScaleView};

/// Longest stored sample reason
pub const MAX_REASON_LEN: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoringSession {
    pub id: Uuid,
    pub student_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub average_percent: f64,
}

/// Session as returned to clients, with the average on every scale
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub student_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_open: bool,
    pub average: ScaleView,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttentionSample {
    pub id: i64,
    pub session_id: Uuid,
    pub score: i32,
    pub absent: bool,
    pub reason: String,
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub yaw: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordSampleRequest {
    #[validate(range(min = 0, max = 100))]
    pub score: i32,
    #[serde(default)]
    pub absent: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub yaw: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RecordSampleResponse {
    pub recorded: bool,
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    pub attempt_id: Option<Uuid>,
}

/// Stop/finish body. Averages are kept raw so malformed values can be skipped.
#[derive(Debug, Default, Deserialize)]
pub struct CloseAverageRequest {
    pub attempt_id: Option<Uuid>,
    pub average_score: Option<serde_json::Value>,
    pub average_score_100: Option<serde_json::Value>,
    pub time_adjusted_avg: Option<serde_json::Value>,
}

impl CloseAverageRequest {
    pub fn override_fields(&self) -> OverrideFields<'_> {
        OverrideFields {
            time_adjusted_avg: self.time_adjusted_avg.as_ref(),
            average_score_100: self.average_score_100.as_ref(),
            average_score: self.average_score.as_ref(),
        }
    }
}

impl MonitoringSession {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn average(&self) -> Percent {
        Percent::new(self.average_percent)
    }

    pub fn to_info(&self) -> SessionInfo {
        let average = self.average();
        SessionInfo {
            id: self.id,
            student_id: self.student_id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            is_open: self.is_open(),
            average: average.into(),
            present: average.value() >= 50.0,
        }
    }

    pub async fn open(conn: &mut PgConnection, student_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MonitoringSession>(
            "INSERT INTO monitoring_sessions (student_id) VALUES ($1) RETURNING *"
        )
        .bind(student_id)
        .fetch_one(conn)
        .await
    }

    pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonitoringSession>(
            "SELECT * FROM monitoring_sessions WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Most recently started open session of a student
    pub async fn current_open(conn: &mut PgConnection, student_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonitoringSession>(
            r#"
            SELECT * FROM monitoring_sessions
            WHERE student_id = $1 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            FOR UPDATE
            "#
        )
        .bind(student_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn open_ids_for_student(conn: &mut PgConnection, student_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM monitoring_sessions
            WHERE student_id = $1 AND ended_at IS NULL
            ORDER BY started_at ASC
            FOR UPDATE
            "#
        )
        .bind(student_id)
        .fetch_all(conn)
        .await
    }

    /// Close if still open. `None` means someone else closed it first.
    pub async fn close(conn: &mut PgConnection, id: Uuid, average: Percent) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonitoringSession>(
            r#"
            UPDATE monitoring_sessions
            SET ended_at = NOW(), average_percent = $2
            WHERE id = $1 AND ended_at IS NULL
            RETURNING *
            "#
        )
        .bind(id)
        .bind(average.value())
        .fetch_optional(conn)
        .await
    }

    pub async fn list_by_student(pool: &PgPool, student_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonitoringSession>(
            "SELECT * FROM monitoring_sessions WHERE student_id = $1 ORDER BY started_at DESC"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    pub async fn last_closed(pool: &PgPool, student_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MonitoringSession>(
            r#"
            SELECT * FROM monitoring_sessions
            WHERE student_id = $1 AND ended_at IS NOT NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#
        )
        .bind(student_id)
        .fetch_optional(pool)
        .await
    }
}

impl AttentionSample {
    pub async fn create(
        conn: &mut PgConnection,
        session_id: Uuid,
        data: &RecordSampleRequest,
    ) -> Result<Self, sqlx::Error> {
        let reason = truncate_reason(data.reason.as_deref().unwrap_or_default());

        sqlx::query_as::<_, AttentionSample>(
            r#"
            INSERT INTO attention_samples (session_id, score, absent, reason, ear, mar, yaw)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#
        )
        .bind(session_id)
        .bind(data.score)
        .bind(data.absent)
        .bind(reason)
        .bind(data.ear)
        .bind(data.mar)
        .bind(data.yaw)
        .fetch_one(conn)
        .await
    }

    /// Fold every sample of a session into an aggregator
    pub async fn aggregate(conn: &mut PgConnection, session_id: Uuid) -> Result<AttentionAggregator, sqlx::Error> {
        let rows = sqlx::query_as::<_, (i32, bool)>(
            "SELECT score, absent FROM attention_samples WHERE session_id = $1"
        )
        .bind(session_id)
        .fetch_all(conn)
        .await?;

        Ok(rows.into_iter().map(|(score, absent)| (f64::from(score), absent)).collect())
    }
}

fn truncate_reason(reason: &str) -> &str {
    match reason.char_indices().nth(MAX_REASON_LEN) {
        Some((idx, _)) => &reason[..idx],
        None => reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_reason() {
        assert_eq!(truncate_reason("tab hidden"), "tab hidden");
        let long = "ñ".repeat(80);
        assert_eq!(truncate_reason(&long).chars().count(), MAX_REASON_LEN);
    }

    #[test]
    fn test_sample_validation() {
        let ok: RecordSampleRequest = serde_json::from_value(json!({"score": 80})).unwrap();
        assert!(ok.validate().is_ok());
        assert!(!ok.absent);

        let bad: RecordSampleRequest = serde_json::from_value(json!({"score": 101, "absent": true})).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_close_request_keeps_raw_values() {
        let req: CloseAverageRequest =
            serde_json::from_value(json!({"average_score_100": "oops", "average_score": 0.75})).unwrap();
        let resolved = req.override_fields().resolve().unwrap();
        assert_eq!(resolved.to_percent().value(), 75.0);
    }

    #[test]
    fn test_session_info_scales() {
        let session = MonitoringSession {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            average_percent: 75.0,
        };
        let info = session.to_info();
        assert!(!info.is_open);
        assert!(info.present);
        assert_eq!(info.average.twenty, 15.0);
        assert_eq!(info.average.fraction, 0.75);
    }
}
