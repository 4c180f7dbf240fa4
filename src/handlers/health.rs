//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    pool: PoolStatus,
}

#[derive(Serialize)]
pub struct PoolStatus {
    size: u32,
    idle: usize,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        pool: PoolStatus {
            size: state.pool.size(),
            idle: state.pool.num_idle(),
        },
    })
}
