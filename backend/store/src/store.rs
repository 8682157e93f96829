use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use aquadash_core::{DashboardSummary, Project, RiskIdentification, User, UserProfile};

use crate::risk::RiskKind;

/// Cockpit users keyed by their enterprise-chat id.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<User>>;

    /// Find the user for a WeWork id, creating it on first login.
    /// Profile fields are refreshed on every call.
    async fn get_or_create_by_wework_id(&self, wework_id: &str, profile: UserProfile)
        -> Result<User>;
}

/// The sales-pipeline projects the cockpit reports on.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Project>>;

    /// All projects, most recently updated first.
    async fn all(&self) -> Result<Vec<Project>>;

    /// Insert or replace by id.
    async fn insert(&self, project: Project) -> Result<()>;

    async fn dashboard_summary(&self, now: DateTime<Utc>) -> Result<DashboardSummary>;

    async fn risk_candidates(&self, kind: RiskKind, now: DateTime<Utc>) -> Result<Vec<Project>>;
}

/// Risk notices sent about projects.
#[async_trait]
pub trait RiskStore: Send + Sync {
    async fn record(&self, risk: RiskIdentification) -> Result<RiskIdentification>;

    /// Notices for one project, oldest first.
    async fn list_for_project(&self, project_id: &str) -> Result<Vec<RiskIdentification>>;
}
