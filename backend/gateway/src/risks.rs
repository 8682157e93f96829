use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use aquadash_core::{Project, RiskLevel};
use aquadash_store::RiskKind;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RiskQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Handler for `GET /api/risks?type=`. Unknown types yield an empty list.
pub async fn list_risks(
    State(state): State<AppState>,
    Query(query): Query<RiskQuery>,
) -> ApiResult<Json<Value>> {
    let key = query
        .kind
        .unwrap_or_else(|| RiskKind::default().as_key().to_string());

    let rows: Vec<Value> = match RiskKind::from_key(&key) {
        Some(kind) => state
            .projects
            .risk_candidates(kind, Utc::now())
            .await
            .map_err(|e| ApiError::from(e).labelled("获取数据失败"))?
            .iter()
            .map(|p| risk_row(kind, p))
            .collect(),
        None => {
            debug!(kind = %key, "Unknown risk type");
            Vec::new()
        }
    };

    Ok(Json(json!({
        "success": true,
        "data": rows,
        "type": key,
    })))
}

/// The row shape the cockpit panel for `kind` renders.
pub fn risk_row(kind: RiskKind, p: &Project) -> Value {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    match kind {
        RiskKind::Prediction => {
            let gap = p.gap_amount.unwrap_or(0.0);
            let target = p.target_forecast.unwrap_or(0.0);
            let percentage = if target != 0.0 { gap / target * 100.0 } else { 0.0 };
            json!({
                "projectName": p.name,
                "region": p.region,
                "owner": p.owner,
                "gapAmount": gap,
                "currentForecast": p.current_forecast.unwrap_or(0.0),
                "targetForecast": target,
                "gapPercentage": percentage,
                "feedback": text(&p.feedback),
            })
        }
        RiskKind::Urge => json!({
            "id": p.id,
            "projectCode": p.project_code,
            "name": p.name,
            "amount": p.amount.unwrap_or(0.0),
            "probability": p.probability.clone().unwrap_or_else(|| "medium".to_string()),
            "region": p.region,
            "salesEngineer": p.owner,
            "cityManager": p.owner,
            "projectType": p.project_type,
            "projectPhase": p.project_phase,
            "detail": p.detail,
            "expectedOrderDate": text(&p.expected_order_date),
            "delayDays": p.delay_days.unwrap_or(0),
            "riskReason": text(&p.risk_reason),
            "feedback": text(&p.feedback),
        }),
        RiskKind::Dependency => {
            let amount = p.amount.unwrap_or(0.0);
            let prediction = p.prediction_amount.unwrap_or(0.0);
            let ratio = if prediction > 0.0 { amount / prediction * 100.0 } else { 0.0 };
            json!({
                "projectName": p.name,
                "projectId": p.id,
                "amount": amount,
                "predictionAmount": prediction,
                "predictionRatio": ratio,
                "region": p.region,
                "owner": p.owner,
                "status": p.risk_level.unwrap_or(RiskLevel::Normal),
            })
        }
        RiskKind::Report => json!({
            "owner": p.owner,
            "region": p.region,
            "newReportedCount": 0,
            "gapCount": 1,
            "feedback": text(&p.feedback),
        }),
        RiskKind::Conversion => json!({
            "owner": p.owner,
            "region": p.region,
            "uncontactedCount": 1,
            "feedback": text(&p.feedback),
        }),
        RiskKind::Stagnation => json!({
            "owner": p.owner,
            "region": p.region,
            "stagnationCount": 1,
            "feedback": text(&p.feedback),
        }),
    }
}
