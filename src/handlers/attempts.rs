//! Activity attempt handlers

use axum::{extract::{State, Path}, http::StatusCode, Json};
use uuid::Uuid;

use crate::{AppState, AppResult};
use crate::grading::Percent;
use crate::lifecycle::{self, attempt};
use crate::models::{
    ActivityAttempt, CloseAverageRequest, FinishAttemptResponse,
    StartAttemptResponse, SubmitQuizRequest, SubmitQuizResponse,
};
use crate::middleware::auth::UserContext;

/// Start or resume an attempt
pub async fn start(
    State(state): State<AppState>,
    user: UserContext,
    Path(activity_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<StartAttemptResponse>)> {
    let weights = lifecycle::current_weights(&state).await?;

    let mut tx = state.pool.begin().await?;
    let attempt = attempt::start_attempt(&mut tx, activity_id, user.user_id, weights).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(StartAttemptResponse {
        attempt_id: attempt.id,
        activity_id: attempt.activity_id,
        started_at: attempt.started_at,
        monitoring_session_id: attempt.monitoring_id,
    })))
}

/// Finish the open (or given) attempt
pub async fn finish(
    State(state): State<AppState>,
    user: UserContext,
    Path(activity_id): Path<Uuid>,
    body: Option<Json<CloseAverageRequest>>,
) -> AppResult<Json<FinishAttemptResponse>> {
    let Json(req) = body.unwrap_or_default();
    let average = req.override_fields().resolve();
    let weights = lifecycle::current_weights(&state).await?;

    let mut tx = state.pool.begin().await?;
    let finished = attempt::finish_attempt(
        &mut tx, activity_id, user.user_id, req.attempt_id, average, weights,
    ).await?;
    tx.commit().await?;

    Ok(Json(FinishAttemptResponse {
        attempt_id: finished.id,
        state: finished.state(),
        monitoring_score: finished.monitoring_score,
        monitoring_fraction: Percent::new(finished.monitoring_score).as_fraction(),
        evaluation_grade: finished.evaluation_grade.unwrap_or(0.0),
        final_grade: finished.final_grade,
    }))
}

/// Score quiz answers
pub async fn submit_quiz(
    State(state): State<AppState>,
    user: UserContext,
    Path(activity_id): Path<Uuid>,
    Json(req): Json<SubmitQuizRequest>,
) -> AppResult<Json<SubmitQuizResponse>> {
    let weights = lifecycle::current_weights(&state).await?;

    let mut tx = state.pool.begin().await?;
    let (score, graded) = attempt::submit_quiz(
        &mut tx, activity_id, user.user_id, req.attempt_id, &req.answers, weights,
    ).await?;
    tx.commit().await?;

    Ok(Json(SubmitQuizResponse {
        attempt_id: graded.id,
        points_earned: score.points_earned,
        points_total: score.points_total,
        grade_percent: score.grade_percent.value(),
        final_grade: graded.final_grade,
    }))
}

/// List the caller's attempts
pub async fn list_mine(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<Vec<ActivityAttempt>>> {
    let attempts = ActivityAttempt::list_by_student(&state.pool, user.user_id).await?;
    Ok(Json(attempts))
}
