//! Monitoring session handlers
//!
//! This endpoint family reports session averages on the 0..20 scale.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{AppState, AppResult};
use crate::lifecycle::{self, monitoring};
use crate::models::{
    AttemptSummary, CloseAverageRequest, MonitoringSession, RecordSampleRequest,
    RecordSampleResponse, SessionInfo, StartSessionRequest,
};
use crate::middleware::auth::UserContext;

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session: SessionInfo,
    pub attempt: Option<AttemptSummary>,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub closed: bool,
    pub average_20: Option<f64>,
    pub session: Option<SessionInfo>,
    pub attempt: Option<AttemptSummary>,
}

/// Open a session, closing any previous one
pub async fn start(
    State(state): State<AppState>,
    user: UserContext,
    body: Option<Json<StartSessionRequest>>,
) -> AppResult<(StatusCode, Json<StartSessionResponse>)> {
    let Json(req) = body.unwrap_or_default();
    let weights = lifecycle::current_weights(&state).await?;

    let mut tx = state.pool.begin().await?;
    let (session, attempt) = monitoring::start_session(&mut tx, user.user_id, req.attempt_id, weights).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(StartSessionResponse {
        session: session.to_info(),
        attempt: attempt.map(|a| a.summary()),
    })))
}

/// Record one attention sample; silently dropped without an open session
pub async fn sample(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<RecordSampleRequest>,
) -> AppResult<Json<RecordSampleResponse>> {
    req.validate()?;

    let mut tx = state.pool.begin().await?;
    let stored = monitoring::record_sample(&mut tx, user.user_id, &req).await?;
    tx.commit().await?;

    Ok(Json(match stored {
        Some(s) => RecordSampleResponse { recorded: true, session_id: Some(s.session_id), detail: None },
        None => RecordSampleResponse { recorded: false, session_id: None, detail: Some("no open session") },
    }))
}

/// Close the caller's open session
pub async fn stop(
    State(state): State<AppState>,
    user: UserContext,
    body: Option<Json<CloseAverageRequest>>,
) -> AppResult<Json<StopSessionResponse>> {
    let Json(req) = body.unwrap_or_default();
    let average = req.override_fields().resolve();
    let weights = lifecycle::current_weights(&state).await?;

    let mut tx = state.pool.begin().await?;
    let closed = monitoring::stop_current(&mut tx, user.user_id, average, weights).await?;
    tx.commit().await?;

    let Some(closed) = closed else {
        return Ok(Json(StopSessionResponse { closed: false, average_20: None, session: None, attempt: None }));
    };

    Ok(Json(StopSessionResponse {
        closed: true,
        average_20: Some(closed.session.average().as_twenty()),
        session: Some(closed.session.to_info()),
        attempt: closed.attempt.map(|a| a.summary()),
    }))
}

/// List the caller's sessions, newest first
pub async fn list_mine(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<Vec<SessionInfo>>> {
    let sessions = MonitoringSession::list_by_student(&state.pool, user.user_id).await?;
    Ok(Json(sessions.iter().map(MonitoringSession::to_info).collect()))
}

/// Latest closed session average on the 0..20 scale
pub async fn last(
    State(state): State<AppState>,
    user: UserContext,
) -> AppResult<Json<Value>> {
    let last = MonitoringSession::last_closed(&state.pool, user.user_id).await?;
    Ok(Json(json!({ "average_20": last.map(|s| s.average().as_twenty()) })))
}
