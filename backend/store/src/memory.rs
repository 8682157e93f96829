use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use aquadash_core::{DashboardSummary, Project, RiskIdentification, User, UserProfile};

use crate::risk::RiskKind;
use crate::store::{ProjectStore, RiskStore, UserStore};
use crate::summary::summarize;

/// In-memory implementation of every store, for single-node deployments,
/// demos and tests. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    projects: Arc<RwLock<HashMap<String, Project>>>,
    risks: Arc<RwLock<Vec<RiskIdentification>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `projects`.
    pub async fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let store = Self::new();
        {
            let mut map = store.projects.write().await;
            for p in projects {
                map.insert(p.id.clone(), p);
            }
        }
        store
    }

    /// Load projects from a JSON array file.
    pub async fn load_seed(&self, path: &Path) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let projects: Vec<Project> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
        let count = projects.len();
        let mut map = self.projects.write().await;
        for p in projects {
            map.insert(p.id.clone(), p);
        }
        info!(count, path = %path.display(), "Loaded seed projects");
        Ok(count)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_or_create_by_wework_id(
        &self,
        wework_id: &str,
        profile: UserProfile,
    ) -> Result<User> {
        let now = Utc::now();
        let mut users = self.users.write().await;

        if let Some(user) = users.values_mut().find(|u| u.wework_user_id == wework_id) {
            user.name = profile.name;
            user.mobile = profile.mobile;
            user.department = profile.department;
            user.position = profile.position;
            user.avatar = profile.avatar;
            user.updated_at = now;
            debug!(user_id = %user.id, "Refreshed user profile");
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            wework_user_id: wework_id.to_string(),
            name: profile.name,
            mobile: profile.mobile,
            department: profile.department,
            position: profile.position,
            avatar: profile.avatar,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        info!(user_id = %user.id, wework_user_id = %wework_id, "Created user");
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Project>> {
        let mut all: Vec<Project> = self.projects.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn insert(&self, project: Project) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project);
        Ok(())
    }

    async fn dashboard_summary(&self, now: DateTime<Utc>) -> Result<DashboardSummary> {
        Ok(summarize(self.projects.read().await.values(), now))
    }

    async fn risk_candidates(&self, kind: RiskKind, now: DateTime<Utc>) -> Result<Vec<Project>> {
        Ok(kind.select(self.projects.read().await.values(), now))
    }
}

#[async_trait]
impl RiskStore for MemoryStore {
    async fn record(&self, risk: RiskIdentification) -> Result<RiskIdentification> {
        self.risks.write().await.push(risk.clone());
        Ok(risk)
    }

    async fn list_for_project(&self, project_id: &str) -> Result<Vec<RiskIdentification>> {
        Ok(self
            .risks
            .read()
            .await
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }
}
