//! Grading weight configuration handlers (admin only)

use axum::{extract::State, Json};
use validator::Validate;

use crate::{AppState, AppResult};
use crate::grading::WeightConfig;
use crate::lifecycle;
use crate::models::{StoredWeights, UpdateWeights};
use crate::middleware::auth::{require_admin, UserContext};

/// Current split
pub async fn get(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<WeightConfig>> {
    require_admin(&user)?;
    let weights = lifecycle::current_weights(&state).await?;
    Ok(Json(weights))
}

/// Replace the split; rejected unless it adds up to 100
pub async fn update(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<UpdateWeights>,
) -> AppResult<Json<WeightConfig>> {
    require_admin(&user)?;
    req.validate()?;

    let weights = WeightConfig::new(req.evaluation_weight, req.attention_weight)?;
    let stored = StoredWeights::save(&state.pool, weights).await?;
    state.weights.store(stored).await;

    tracing::info!(
        "Grading weights set to {}/{} by {}",
        stored.evaluation_weight, stored.attention_weight, user.user_id
    );

    Ok(Json(stored))
}
