//! Activity attempt lifecycle
//!
//! ```text
//!   NOT_STARTED ──start──► OPEN ──finish──► FINISHED
//!                           │  ▲
//!            submit-quiz /  │  │  final grade recomputed
//!            file grading   └──┘
//! ```

use sqlx::PgConnection;
use uuid::Uuid;

use crate::grading::{score_quiz, AverageOverride, Percent, QuizAnswer, QuizScore, WeightConfig};
use crate::middleware::auth::UserContext;
use crate::models::{Activity, ActivityAttempt, AttemptState, Evaluation, ExamMode, MonitoringSession, Submission};
use crate::{AppError, AppResult};

use super::monitoring::{close_session, open_exclusive};
use super::recompute::recompute_final_grade;

async fn load_activity(conn: &mut PgConnection, activity_id: Uuid) -> AppResult<Activity> {
    Activity::find_by_id(conn, activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
}

/// Start (or resume) the student's attempt at an activity.
///
/// Returns the open attempt for the pair when one exists. A new attempt on a
/// monitored activity gets its own monitoring session, and so does a reused
/// one whose session is no longer open.
pub async fn start_attempt(
    conn: &mut PgConnection,
    activity_id: Uuid,
    student_id: Uuid,
    weights: WeightConfig,
) -> AppResult<ActivityAttempt> {
    let activity = load_activity(&mut *conn, activity_id).await?;

    if let Some(existing) = ActivityAttempt::find_open(&mut *conn, activity.id, student_id).await? {
        tracing::debug!("Reusing open attempt {} for {}", existing.id, student_id);
        if !activity.requires_monitoring || is_monitored(&mut *conn, &existing).await? {
            return Ok(existing);
        }

        // Its session was stopped or replaced; resume monitoring on a fresh one
        let (session, _) = open_exclusive(&mut *conn, student_id, weights).await?;
        tracing::info!("Attempt {} resumed with monitoring session {}", existing.id, session.id);
        return Ok(ActivityAttempt::link_monitoring(conn, existing.id, session.id).await?);
    }

    let Some(attempt) = ActivityAttempt::insert_open(&mut *conn, activity.id, student_id).await? else {
        // Lost a race with a concurrent start; the winner's attempt is the one
        return ActivityAttempt::find_open(&mut *conn, activity.id, student_id)
            .await?
            .ok_or_else(|| AppError::InternalError("Open attempt vanished during start".to_string()));
    };

    tracing::info!("Attempt {} started on activity {} by {}", attempt.id, activity.id, student_id);

    if !activity.requires_monitoring {
        return Ok(attempt);
    }

    let (session, _) = open_exclusive(&mut *conn, student_id, weights).await?;
    Ok(ActivityAttempt::link_monitoring(conn, attempt.id, session.id).await?)
}

/// Whether the attempt's session is the student's open one
async fn is_monitored(conn: &mut PgConnection, attempt: &ActivityAttempt) -> AppResult<bool> {
    let Some(session_id) = attempt.monitoring_id else {
        return Ok(false);
    };
    let current = MonitoringSession::current_open(conn, attempt.student_id).await?;
    Ok(current.is_some_and(|s| s.id == session_id))
}

/// Finish an attempt, closing its monitoring session.
///
/// Targets `attempt_id` when given, otherwise the newest open attempt of the
/// pair. Finishing an already finished attempt returns it untouched.
pub async fn finish_attempt(
    conn: &mut PgConnection,
    activity_id: Uuid,
    student_id: Uuid,
    attempt_id: Option<Uuid>,
    average: Option<AverageOverride>,
    weights: WeightConfig,
) -> AppResult<ActivityAttempt> {
    let attempt = match attempt_id {
        Some(id) => ActivityAttempt::find_owned(&mut *conn, id, student_id, Some(activity_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?,
        None => ActivityAttempt::find_open(&mut *conn, activity_id, student_id)
            .await?
            .ok_or(AppError::NoOpenAttempt)?,
    };

    if attempt.state() == AttemptState::Finished {
        tracing::debug!("Attempt {} already finished", attempt.id);
        return Ok(attempt);
    }

    // Closing locks the session and then the attempt, so the attempt is not
    // locked before this point
    if let Some(session_id) = attempt.monitoring_id {
        close_session(&mut *conn, session_id, average, weights).await?;
    }

    let locked = ActivityAttempt::lock(&mut *conn, attempt.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    let Some(finished) = ActivityAttempt::mark_finished(&mut *conn, locked.id).await? else {
        // Finished concurrently; the locked row is what the winner stored
        return Ok(locked);
    };

    let finished = recompute_final_grade(conn, &finished, weights).await?;
    tracing::info!("Attempt {} finished with final grade {:?}", finished.id, finished.final_grade);
    Ok(finished)
}

/// Score a quiz submission and store it as the attempt's evaluation grade.
///
/// A repeated submission overwrites the previous grade.
pub async fn submit_quiz(
    conn: &mut PgConnection,
    activity_id: Uuid,
    student_id: Uuid,
    attempt_id: Option<Uuid>,
    answers: &[QuizAnswer],
    weights: WeightConfig,
) -> AppResult<(QuizScore, ActivityAttempt)> {
    let keys = Evaluation::answer_keys(&mut *conn, activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity has no evaluation".to_string()))?;

    if answers.is_empty() {
        return Err(AppError::ValidationError("answers must not be empty".to_string()));
    }

    let attempt = match attempt_id {
        Some(id) => ActivityAttempt::find_owned(&mut *conn, id, student_id, Some(activity_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?,
        None => ActivityAttempt::latest(&mut *conn, activity_id, student_id)
            .await?
            .ok_or(AppError::NoOpenAttempt)?,
    };

    let score = score_quiz(&keys, answers);

    if let Some(previous) = attempt.evaluation_grade {
        tracing::info!(
            "Attempt {} quiz resubmitted: {} replaces {}",
            attempt.id, score.grade_percent.value(), previous
        );
    }

    let graded = ActivityAttempt::set_evaluation(&mut *conn, attempt.id, score.grade_percent.value(), None).await?;
    let graded = recompute_final_grade(conn, &graded, weights).await?;

    Ok((score, graded))
}

/// Store a grader's mark on a file submission.
///
/// Only the course owner (or an admin) may grade. For file-mode activities
/// the mark, as a percentage of the activity points, becomes the evaluation
/// grade of the student's newest attempt.
pub async fn grade_submission(
    conn: &mut PgConnection,
    grader: &UserContext,
    submission_id: Uuid,
    grade: f64,
    weights: WeightConfig,
) -> AppResult<(Submission, Option<ActivityAttempt>)> {
    let submission = Submission::find_for_update(&mut *conn, submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    let owner = Activity::course_owner(&mut *conn, submission.activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if !grader.is_admin() && owner != grader.user_id {
        tracing::warn!("User {} tried to grade submission {} of another course", grader.user_id, submission.id);
        return Err(AppError::Forbidden);
    }

    let submission = Submission::set_grade(&mut *conn, submission.id, grade).await?;
    let activity = load_activity(&mut *conn, submission.activity_id).await?;

    if activity.exam_mode() != ExamMode::File {
        tracing::debug!("Submission {} graded on a {} activity", submission.id, activity.exam_mode().as_str());
        return Ok((submission, None));
    }
    if activity.points <= 0 {
        tracing::warn!("Activity {} has no points; grade not propagated", activity.id);
        return Ok((submission, None));
    }

    let Some(attempt) = ActivityAttempt::latest(&mut *conn, activity.id, submission.student_id).await? else {
        return Ok((submission, None));
    };

    let percent = Percent::ratio(grade, f64::from(activity.points));
    let attempt = ActivityAttempt::set_evaluation(&mut *conn, attempt.id, percent.value(), Some(submission.id)).await?;
    let attempt = recompute_final_grade(conn, &attempt, weights).await?;

    tracing::info!("Submission {} graded {} -> attempt {} final {:?}", submission.id, grade, attempt.id, attempt.final_grade);
    Ok((submission, Some(attempt)))
}
