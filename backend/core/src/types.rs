use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cockpit user, created on first enterprise-chat login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub wework_user_id: String,
    pub name: String,
    pub mobile: Option<String>,
    /// Comma-separated department ids.
    pub department: Option<String>,
    pub position: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields copied from the enterprise directory on every login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub mobile: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub avatar: Option<String>,
}

/// Contents of the `session` cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub wework_user_id: String,
    pub name: String,
}

impl From<&User> for SessionClaims {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            wework_user_id: user.wework_user_id.clone(),
            name: user.name.clone(),
        }
    }
}

/// Pipeline status of a project. Unrecognized values are preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Completed,
    Cancelled,
    InsufficientReport,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InsufficientReport => write!(f, "insufficient_report"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum RiskLevel {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "highRisk")]
    HighRisk,
    #[serde(rename = "critical")]
    Critical,
}

impl RiskLevel {
    pub fn is_risky(self) -> bool {
        matches!(self, Self::HighRisk | Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::HighRisk => write!(f, "highRisk"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A sales-pipeline project. Amounts are in yuan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub project_code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    pub region: String,
    pub owner: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub gap_amount: Option<f64>,
    #[serde(default)]
    pub current_forecast: Option<f64>,
    #[serde(default)]
    pub target_forecast: Option<f64>,
    #[serde(default)]
    pub prediction_amount: Option<f64>,
    /// Between 0 and 1.
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub grade: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub project_phase: Option<String>,
    /// `high`, `medium` or `low`.
    #[serde(default)]
    pub probability: Option<String>,
    #[serde(default)]
    pub expected_order_date: Option<String>,
    #[serde(default)]
    pub delay_days: Option<i64>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub risk_reason: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Minimal in-progress project, mostly useful for seeding and tests.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        region: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project_code: None,
            name: name.into(),
            industry: None,
            channel: None,
            region: region.into(),
            owner: owner.into(),
            amount: None,
            gap_amount: None,
            current_forecast: None,
            target_forecast: None,
            prediction_amount: None,
            conversion_rate: None,
            grade: None,
            status: ProjectStatus::InProgress,
            risk_level: None,
            current_node: None,
            project_type: None,
            project_phase: None,
            probability: None,
            expected_order_date: None,
            delay_days: None,
            detail: None,
            risk_reason: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A risk notice recorded against a project (the "send message" action).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskIdentification {
    pub id: Uuid,
    pub project_id: String,
    /// One of the risk kinds (`prediction`, `urge`, ...), kept as sent by the client.
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    pub message_template: Option<String>,
    /// `pending`, `sent` or `completed`.
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub sent_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw cockpit headline numbers. Amount in yuan, conversion rate in `[0, 1]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub total_amount: f64,
    pub conversion_rate: f64,
    pub risk_projects: usize,
    pub stagnant_projects: usize,
    pub in_progress_projects: usize,
    pub completed_projects: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keeps_unknown_values() {
        let s: ProjectStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(s, ProjectStatus::InProgress);
        let s: ProjectStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(s, ProjectStatus::Other("on_hold".into()));
        assert_eq!(s.to_string(), "on_hold");
    }

    #[test]
    fn risk_level_uses_camel_case_wire_names() {
        let level: RiskLevel = serde_json::from_str("\"highRisk\"").unwrap();
        assert!(level.is_risky());
        assert!(!RiskLevel::Normal.is_risky());
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn project_deserializes_from_sparse_json() {
        let p: Project = serde_json::from_str(
            r#"{"id":"p1","name":"净水一期","region":"华东","owner":"张三","status":"completed","amount":1200000}"#,
        )
        .unwrap();
        assert_eq!(p.status, ProjectStatus::Completed);
        assert_eq!(p.amount, Some(1_200_000.0));
        assert!(p.delay_days.is_none());
    }
}
