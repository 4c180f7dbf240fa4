//! Submission grading handler

use axum::{extract::{State, Path}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, AppResult};
use crate::lifecycle::{self, attempt};
use crate::models::{AttemptSummary, Submission};
use crate::middleware::auth::{require_role, Role, UserContext};

#[derive(Debug, Deserialize, Validate)]
pub struct GradeSubmissionRequest {
    #[validate(range(min = 0.0))]
    pub grade: f64,
}

#[derive(Debug, Serialize)]
pub struct GradeSubmissionResponse {
    pub submission: Submission,
    pub attempt: Option<AttemptSummary>,
}

/// Grade a file submission (course owner or admin)
pub async fn grade(
    State(state): State<AppState>,
    user: UserContext,
    Path(id): Path<Uuid>,
    Json(req): Json<GradeSubmissionRequest>,
) -> AppResult<Json<GradeSubmissionResponse>> {
    require_role(&user, &[Role::Professor, Role::Admin])?;
    req.validate()?;

    let weights = lifecycle::current_weights(&state).await?;

    let mut tx = state.pool.begin().await?;
    let (submission, graded) = attempt::grade_submission(&mut tx, &user, id, req.grade, weights).await?;
    tx.commit().await?;

    Ok(Json(GradeSubmissionResponse {
        submission,
        attempt: graded.map(|a| a.summary()),
    }))
}
