use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use aquadash_core::DashboardSummary;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Headline numbers in display units: amount in 万元, conversion rate in percent.
pub fn display_summary(summary: &DashboardSummary) -> Value {
    json!({
        "totalProjects": summary.total_projects,
        "totalAmount": summary.total_amount / 10_000.0,
        "conversionRate": summary.conversion_rate * 100.0,
        "riskProjects": summary.risk_projects,
        "stagnantProjects": summary.stagnant_projects,
        "inProgressProjects": summary.in_progress_projects,
        "completedProjects": summary.completed_projects,
    })
}

/// Handler for `GET /api/dashboard/summary`
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let summary = state
        .projects
        .dashboard_summary(Utc::now())
        .await
        .map_err(|e| ApiError::from(e).labelled("获取数据失败"))?;
    Ok(Json(json!({
        "success": true,
        "data": display_summary(&summary),
    })))
}
