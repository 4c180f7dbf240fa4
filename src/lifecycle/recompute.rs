//! Final grade recomputation
//!
//! Runs inside the caller's transaction every time an input of the
//! compositor changes, so `final_grade` never lags behind its inputs.

use sqlx::PgConnection;

use crate::grading::{compose, scale::round2, Percent, WeightConfig};
use crate::models::{Activity, ActivityAttempt, ExamMode, Submission};
use crate::{AppError, AppResult};

/// Recompute and persist `final_grade` for one attempt.
///
/// For file-mode activities the newest graded submission replaces the stored
/// evaluation grade.
pub async fn recompute_final_grade(
    conn: &mut PgConnection,
    attempt: &ActivityAttempt,
    weights: WeightConfig,
) -> AppResult<ActivityAttempt> {
    let activity = Activity::find_by_id(&mut *conn, attempt.activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;

    let mut evaluation = attempt.evaluation_grade;

    if activity.exam_mode() == ExamMode::File && activity.points > 0 {
        let graded = Submission::latest_graded(&mut *conn, activity.id, attempt.student_id).await?;
        if let Some(grade) = graded.and_then(|s| s.grade) {
            evaluation = Some(Percent::ratio(grade, f64::from(activity.points)).value());
        }
    }

    let final_grade = compose(evaluation, Some(attempt.monitoring_score), weights);
    let updated = ActivityAttempt::store_grades(conn, attempt.id, evaluation.map(round2), final_grade).await?;

    tracing::debug!(
        "Attempt {} recomputed: evaluation={:?} monitoring={} final={} ({}/{})",
        updated.id,
        updated.evaluation_grade,
        updated.monitoring_score,
        final_grade,
        weights.evaluation_weight,
        weights.attention_weight
    );

    Ok(updated)
}
