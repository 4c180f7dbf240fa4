//! Monitoring session lifecycle
//!
//! ```text
//!   start ──► OPEN ──(samples)──► stop / force-close ──► CLOSED
//! ```
//!
//! A student has at most one OPEN session: starting a new one closes the
//! previous ones first, each finalised from its own samples.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::grading::{AverageOverride, WeightConfig};
use crate::models::{ActivityAttempt, AttemptState, AttentionSample, MonitoringSession, RecordSampleRequest};
use crate::{AppError, AppResult};

use super::recompute::recompute_final_grade;

/// A session that was just closed, with the attempt it fed (if any)
#[derive(Debug)]
pub struct ClosedSession {
    pub session: MonitoringSession,
    pub attempt: Option<ActivityAttempt>,
}

/// Close every open session of the student, then open a fresh one.
///
/// Returns the new session along with the sessions that were force-closed.
pub async fn open_exclusive(
    conn: &mut PgConnection,
    student_id: Uuid,
    weights: WeightConfig,
) -> AppResult<(MonitoringSession, Vec<ClosedSession>)> {
    let mut closed = Vec::new();
    for stale in MonitoringSession::open_ids_for_student(&mut *conn, student_id).await? {
        if let Some(session) = close_session(&mut *conn, stale, None, weights).await? {
            tracing::info!("Force-closed stale monitoring session {} of {}", stale, student_id);
            closed.push(session);
        }
    }

    let session = MonitoringSession::open(conn, student_id).await?;
    tracing::info!("Monitoring session {} opened for {}", session.id, student_id);
    Ok((session, closed))
}

/// Open a session and link it to an attempt.
///
/// With `attempt_id` the attempt must belong to the student. When its session
/// is the one currently open, that session is returned untouched. Otherwise a
/// fresh session replaces the open one and is linked to the attempt if it is
/// still open. Without `attempt_id` the new session goes to the open attempt
/// whose session was just force-closed, or else to the newest open attempt
/// that has no session.
pub async fn start_session(
    conn: &mut PgConnection,
    student_id: Uuid,
    attempt_id: Option<Uuid>,
    weights: WeightConfig,
) -> AppResult<(MonitoringSession, Option<ActivityAttempt>)> {
    let target = match attempt_id {
        Some(id) => Some(
            ActivityAttempt::find_owned(&mut *conn, id, student_id, None)
                .await?
                .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?,
        ),
        None => None,
    };

    if let Some(current) = MonitoringSession::current_open(&mut *conn, student_id).await? {
        if let Some(attempt) = target.as_ref().filter(|a| a.monitoring_id == Some(current.id)) {
            tracing::debug!("Attempt {} is already monitored by session {}", attempt.id, current.id);
            let attempt = attempt.clone();
            return Ok((current, Some(attempt)));
        }
    }

    let (session, closed) = open_exclusive(&mut *conn, student_id, weights).await?;

    let candidate = match target {
        Some(attempt) => Some(attempt),
        None => match interrupted_attempt(closed) {
            Some(attempt) => Some(attempt),
            None => ActivityAttempt::latest_open_unmonitored(&mut *conn, student_id).await?,
        },
    };

    let attempt = match candidate {
        Some(attempt) if attempt.state() == AttemptState::Open => {
            tracing::info!("Attempt {} now monitored by session {}", attempt.id, session.id);
            Some(ActivityAttempt::link_monitoring(conn, attempt.id, session.id).await?)
        }
        other => other,
    };

    Ok((session, attempt))
}

/// Still-open attempt whose session was force-closed
fn interrupted_attempt(closed: Vec<ClosedSession>) -> Option<ActivityAttempt> {
    closed
        .into_iter()
        .filter_map(|c| c.attempt)
        .find(|a| a.state() == AttemptState::Open)
}

/// Append a sample to the student's open session.
///
/// `None` when no session is open; the sample is dropped.
pub async fn record_sample(
    conn: &mut PgConnection,
    student_id: Uuid,
    sample: &RecordSampleRequest,
) -> AppResult<Option<AttentionSample>> {
    let Some(session) = MonitoringSession::current_open(&mut *conn, student_id).await? else {
        tracing::debug!("Dropping sample from {}: no open session", student_id);
        return Ok(None);
    };

    let stored = AttentionSample::create(conn, session.id, sample).await?;
    Ok(Some(stored))
}

/// Close one session if it is still open.
///
/// The average is the client override when given, otherwise the sample mean.
/// A linked attempt receives the average as its monitoring score and gets its
/// final grade recomputed, unless it is already finished. `None` when the
/// session was already closed.
pub async fn close_session(
    conn: &mut PgConnection,
    session_id: Uuid,
    average: Option<AverageOverride>,
    weights: WeightConfig,
) -> AppResult<Option<ClosedSession>> {
    // Session row first, then the attempt; samples are appended under the same lock
    match MonitoringSession::find_for_update(&mut *conn, session_id).await? {
        Some(locked) if locked.is_open() => {}
        _ => return Ok(None),
    }

    let aggregate = AttentionSample::aggregate(&mut *conn, session_id).await?;
    let average_percent = aggregate.finalize(average);

    let Some(session) = MonitoringSession::close(&mut *conn, session_id, average_percent).await? else {
        return Ok(None);
    };

    tracing::info!(
        "Monitoring session {} closed: {}% over {} samples ({} absent, override: {})",
        session.id,
        average_percent.value(),
        aggregate.count(),
        aggregate.absent_count(),
        average.is_some()
    );

    let attempt = match ActivityAttempt::find_by_monitoring(&mut *conn, session.id).await? {
        Some(attempt) if attempt.state() == AttemptState::Finished => {
            tracing::debug!("Attempt {} already finished; score kept", attempt.id);
            Some(attempt)
        }
        Some(attempt) => {
            let scored = ActivityAttempt::set_monitoring_score(&mut *conn, attempt.id, average_percent.value()).await?;
            Some(recompute_final_grade(conn, &scored, weights).await?)
        }
        None => None,
    };

    Ok(Some(ClosedSession { session, attempt }))
}

/// Close the student's current open session, if any.
pub async fn stop_current(
    conn: &mut PgConnection,
    student_id: Uuid,
    average: Option<AverageOverride>,
    weights: WeightConfig,
) -> AppResult<Option<ClosedSession>> {
    match MonitoringSession::current_open(&mut *conn, student_id).await? {
        Some(session) => close_session(conn, session.id, average, weights).await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::attempt::{finish_attempt, start_attempt};
    use crate::lifecycle::fixtures::{self, course, open_session_count, sample};
    use std::time::Duration;

    fn weights() -> WeightConfig {
        WeightConfig::default()
    }

    #[tokio::test]
    async fn test_start_force_closes_previous_session() {
        let Some(pool) = fixtures::pool().await else { return };
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        let (first, _) = start_session(&mut tx, student, None, weights()).await.unwrap();
        record_sample(&mut tx, student, &sample(60)).await.unwrap();
        record_sample(&mut tx, student, &sample(80)).await.unwrap();
        let (second, _) = start_session(&mut tx, student, None, weights()).await.unwrap();
        tx.commit().await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(open_session_count(&pool, student).await, 1);

        let sessions = MonitoringSession::list_by_student(&pool, student).await.unwrap();
        let closed = sessions.iter().find(|s| s.id == first.id).unwrap();
        assert!(!closed.is_open());
        assert_eq!(closed.average_percent, 70.0);
    }

    #[tokio::test]
    async fn test_no_open_session_is_neutral() {
        let Some(pool) = fixtures::pool().await else { return };
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        assert!(record_sample(&mut tx, student, &sample(90)).await.unwrap().is_none());
        assert!(stop_current(&mut tx, student, None, weights()).await.unwrap().is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_override_is_clamped() {
        let Some(pool) = fixtures::pool().await else { return };
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        start_session(&mut tx, student, None, weights()).await.unwrap();
        record_sample(&mut tx, student, &sample(40)).await.unwrap();
        let closed = stop_current(&mut tx, student, Some(AverageOverride::Percent(150.0)), weights())
            .await
            .unwrap()
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(closed.session.average_percent, 100.0);
        assert!(closed.attempt.is_none());
    }

    #[tokio::test]
    async fn test_stop_feeds_linked_attempt() {
        let Some(pool) = fixtures::pool().await else { return };
        let course = course(&pool, 100, true, "quiz").await;
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        start_attempt(&mut tx, course.activity, student, weights()).await.unwrap();
        for score in [60, 70, 80] {
            record_sample(&mut tx, student, &sample(score)).await.unwrap();
        }
        let closed = stop_current(&mut tx, student, None, weights()).await.unwrap().unwrap();
        tx.commit().await.unwrap();

        let attempt = closed.attempt.unwrap();
        assert_eq!(closed.session.average_percent, 70.0);
        assert_eq!(attempt.monitoring_score, 70.0);
        assert_eq!(attempt.final_grade, Some(21.0));
    }

    #[tokio::test]
    async fn test_start_on_monitored_attempt_keeps_its_session() {
        let Some(pool) = fixtures::pool().await else { return };
        let course = course(&pool, 100, true, "quiz").await;
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        let attempt = start_attempt(&mut tx, course.activity, student, weights()).await.unwrap();
        let (session, linked) = start_session(&mut tx, student, Some(attempt.id), weights()).await.unwrap();
        assert_eq!(Some(session.id), attempt.monitoring_id);
        assert_eq!(linked.unwrap().monitoring_id, Some(session.id));

        let stored = record_sample(&mut tx, student, &sample(80)).await.unwrap().unwrap();
        assert_eq!(stored.session_id, session.id);

        let finished = finish_attempt(&mut tx, course.activity, student, None, None, weights()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(finished.monitoring_score, 80.0);
        assert_eq!(finished.final_grade, Some(24.0));
        assert_eq!(open_session_count(&pool, student).await, 0);
    }

    #[tokio::test]
    async fn test_restart_relinks_interrupted_attempt() {
        let Some(pool) = fixtures::pool().await else { return };
        let course = course(&pool, 100, true, "quiz").await;
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        let attempt = start_attempt(&mut tx, course.activity, student, weights()).await.unwrap();
        let (session, linked) = start_session(&mut tx, student, None, weights()).await.unwrap();
        assert_ne!(Some(session.id), attempt.monitoring_id);

        let linked = linked.unwrap();
        assert_eq!(linked.id, attempt.id);
        assert_eq!(linked.monitoring_id, Some(session.id));

        record_sample(&mut tx, student, &sample(50)).await.unwrap();
        let finished = finish_attempt(&mut tx, course.activity, student, None, None, weights()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(finished.monitoring_score, 50.0);
        assert_eq!(open_session_count(&pool, student).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_stop_and_finish() {
        let Some(pool) = fixtures::pool().await else { return };
        let course = course(&pool, 100, true, "quiz").await;
        let student = Uuid::new_v4();

        let mut tx = pool.begin().await.unwrap();
        start_attempt(&mut tx, course.activity, student, weights()).await.unwrap();
        record_sample(&mut tx, student, &sample(90)).await.unwrap();
        tx.commit().await.unwrap();

        // The stopping transaction holds the session lock while finish starts
        let mut stop_tx = pool.begin().await.unwrap();
        MonitoringSession::current_open(&mut stop_tx, student).await.unwrap().unwrap();

        let finish_pool = pool.clone();
        let finish = tokio::spawn(async move {
            let mut tx = finish_pool.begin().await?;
            let finished = finish_attempt(&mut tx, course.activity, student, None, None, weights()).await?;
            tx.commit().await?;
            Ok::<_, AppError>(finished)
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let closed = stop_current(&mut stop_tx, student, None, weights()).await.unwrap();
        stop_tx.commit().await.unwrap();
        assert!(closed.is_some());

        let finished = finish.await.unwrap().unwrap();
        assert!(finished.ended_at.is_some());
        assert_eq!(finished.monitoring_score, 90.0);
        assert_eq!(finished.final_grade, Some(27.0));
    }
}
