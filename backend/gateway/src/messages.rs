use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use aquadash_channels::Card;
use aquadash_core::{DashError, RiskIdentification};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Recipient recorded when no one was addressed.
const SYSTEM_RECIPIENT: &str = "system";
/// Cockpit page a notice card links to.
const CARD_PAGE: &str = "/gm";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub project_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
    pub recipient_id: Option<String>,
    /// When set, the push is a card with this title linking to the cockpit.
    pub title: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

/// Handler for `POST /api/messages/send`: record a risk notice and, when a
/// recipient and a notification channel exist, push it.
pub async fn send_message(
    State(state): State<AppState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let missing = || ApiError::from(DashError::InvalidRequest("projectId, type and message are required".into()));
    let Json(req) = body.map_err(|_| missing())?;
    let (Some(project_id), Some(kind), Some(message)) =
        (required(req.project_id), required(req.kind), required(req.message))
    else {
        return Err(missing());
    };
    let recipient = required(req.recipient_id);
    let card = required(req.title).map(|title| Card {
        title,
        description: message.clone(),
        url: format!("{}{CARD_PAGE}", state.public_base()),
    });

    let project = state
        .projects
        .get(&project_id)
        .await?
        .ok_or_else(|| {
            ApiError::from(DashError::NotFound(format!("project {project_id}"))).labelled("项目不存在")
        })?;

    let notified = match (&recipient, &state.notifier) {
        (Some(to), Some(notifier)) => {
            let to = std::slice::from_ref(to);
            let pushed = match &card {
                Some(card) => notifier.send_card(to, card).await,
                None => notifier.send_text(to, &message).await,
            };
            match pushed {
                Ok(()) => true,
                Err(e) => {
                    warn!(channel = notifier.name(), project = %project.id, error = %e, "Risk notice push failed");
                    false
                }
            }
        }
        _ => false,
    };

    let now = Utc::now();
    let risk = state
        .risks
        .record(RiskIdentification {
            id: Uuid::new_v4(),
            project_id: project.id.clone(),
            kind,
            description: Some(message.clone()),
            message_template: Some(message),
            status: "sent".to_string(),
            sent_at: Some(now),
            sent_to: Some(recipient.unwrap_or_else(|| SYSTEM_RECIPIENT.to_string())),
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(|e| ApiError::from(e).labelled("发送消息失败"))?;
    info!(project = %risk.project_id, kind = %risk.kind, notified, "Risk notice recorded");

    Ok(Json(json!({
        "success": true,
        "data": risk,
        "message": "消息已保存",
        "notified": notified,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    pub project_id: Option<String>,
}

/// Handler for `GET /api/messages?projectId=`: notices recorded for a project.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Value>> {
    let project_id = required(query.project_id)
        .ok_or_else(|| ApiError::from(DashError::InvalidRequest("projectId is required".into())))?;
    let notices = state
        .risks
        .list_for_project(&project_id)
        .await
        .map_err(|e| ApiError::from(e).labelled("获取数据失败"))?;

    Ok(Json(json!({
        "success": true,
        "data": notices,
    })))
}
