use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub provider: String,
    pub wework: bool,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        provider: state.provider.name().to_string(),
        wework: state.wework.is_some(),
        timestamp: Utc::now(),
    })
}
